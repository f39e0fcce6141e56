//! Reconnection policy for channel connections.
//!
//! This module contains pure functions that decide whether and when a
//! closed channel is reopened, making them easy to test.

use std::time::Duration;

use super::transport::NORMAL_CLOSURE;

const DEFAULT_BASE_DELAY_MS: u64 = 3000;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Capped exponential backoff: `delay = base_delay * 2^attempt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before the reconnect scheduled at `attempt` (0-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay for the next reconnect, or `None` once attempts are exhausted
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.delay_for(attempt))
    }
}

/// Check if a close code means the peer (or we) closed on purpose.
pub fn is_normal_closure(close_code: u16) -> bool {
    close_code == NORMAL_CLOSURE
}

/// Check if the channel should attempt to reconnect after a close.
///
/// # Arguments
///
/// * `close_code` - The close code reported by the transport
/// * `multiplexer_active` - Whether auto-reconnect is currently allowed
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(
    close_code: u16,
    multiplexer_active: bool,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    // Intentional closes and an inactive multiplexer never reconnect
    if is_normal_closure(close_code) || !multiplexer_active {
        return false;
    }

    current_attempt < max_attempts
}
