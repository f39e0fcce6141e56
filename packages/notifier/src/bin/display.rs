//! Public "now serving" display.
//!
//! Subscribes to every configured room plus the shared notifications channel,
//! prints the board whenever it changes and announces turn changes through an
//! external audio player. Falls back to polling while every channel is down.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin madoguchi-display
//! cargo run --bin madoguchi-display -- --host 192.168.1.8 --rooms 1,2,3
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;

use madoguchi_notifier::{
    config::NotifierConfig,
    domain::RoomId,
    infrastructure::{
        audio::{CommandAudioPlayer, command::DEFAULT_PLAYER_COMMAND},
        http::HttpQueueApi,
        transport::WebSocketConnector,
    },
    ui::{BoardFormatter, ConsoleBoardRenderer, ViewActivationController},
};
use madoguchi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "madoguchi-display")]
#[command(about = "Clinic queue display with spoken turn announcements", long_about = None)]
struct Args {
    /// Backend host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Backend port
    #[arg(short = 'p', long, default_value = "8000")]
    port: u16,

    /// Rooms shown on this display
    #[arg(short = 'r', long, value_delimiter = ',', default_value = "1,2,3,4")]
    rooms: Vec<RoomId>,

    /// Audio player command; the clip is written to its stdin
    #[arg(long, default_value = DEFAULT_PLAYER_COMMAND)]
    player: String,

    /// Polling interval in seconds while no channel is connected
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// How often the connection status is logged, in seconds
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    status_interval: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_PKG_NAME"), env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let Some(player) = CommandAudioPlayer::from_command_line(&args.player) else {
        tracing::error!("Invalid player command: '{}'", args.player);
        std::process::exit(1);
    };

    let mut config = NotifierConfig::for_server(&args.host, args.port);
    config.rooms = args.rooms;
    config.poll_interval = Duration::from_secs(args.poll_interval);

    tracing::info!(
        "Display for rooms {:?} on {}",
        config.rooms.iter().map(|room| room.value()).collect::<Vec<_>>(),
        config.http_base_url
    );

    let controller = ViewActivationController::new(
        config.clone(),
        Arc::new(WebSocketConnector),
        Arc::new(HttpQueueApi::new(config.http_base_url.clone())),
        Arc::new(player),
        Arc::new(ConsoleBoardRenderer),
    );

    controller.activate().await;
    tracing::info!("Press Ctrl+C to exit");

    let mut status = tokio::time::interval(Duration::from_secs(args.status_interval));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            _ = status.tick() => {
                let stats = controller.stats().await;
                tracing::info!(
                    "{}{}",
                    BoardFormatter::format_status_line(&stats.channels),
                    if stats.polling { " | polling" } else { "" }
                );
            }
        }
    }

    controller.deactivate().await;
    tracing::info!("Display shutdown complete");
}
