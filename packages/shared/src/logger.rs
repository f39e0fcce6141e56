//! Logging setup utilities for the Madoguchi binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Both the library crate and the binary crate get the same level.
/// Crate names are normalized to their module form (`-` becomes `_`).
pub fn default_directive(library_name: &str, binary_name: &str, default_level: &str) -> String {
    format!(
        "{}={},{}={}",
        library_name.replace('-', "_"),
        default_level,
        binary_name.replace('-', "_"),
        default_level
    )
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `library_name` - The library crate whose logs should be shown (e.g., "madoguchi-notifier")
/// * `binary_name` - The name of the binary (e.g., "madoguchi-display")
/// * `default_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use madoguchi_shared::logger::setup_logger;
///
/// setup_logger("madoguchi-notifier", "madoguchi-display", "info");
/// ```
pub fn setup_logger(library_name: &str, binary_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                default_directive(library_name, binary_name, default_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
