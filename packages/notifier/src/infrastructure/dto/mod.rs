//! Data Transfer Objects (DTOs) for the notification core.
//!
//! DTOs are organized by protocol:
//! - `websocket`: channel message envelopes (inbound and outbound)
//! - `http`: queue API response rows

pub mod conversion;
pub mod http;
pub mod websocket;
