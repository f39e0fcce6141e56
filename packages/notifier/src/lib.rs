//! Turn-notification core for the clinic front desk.
//!
//! Keeps the "now serving" display in sync with the server-side queue over
//! per-room WebSocket channels, falls back to HTTP polling while every
//! channel is down, and announces each turn change exactly once.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;

#[cfg(test)]
pub(crate) mod test_support;
