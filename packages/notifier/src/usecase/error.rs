//! Error types for the operator use cases.

use thiserror::Error;

use crate::domain::{FetchError, RoomId};

/// Errors reported to the room operator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    /// The advance endpoint rejected or failed the request
    #[error("Failed to advance turn: {0}")]
    Advance(#[from] FetchError),

    /// The room channel is not open; a reconnect has been requested
    #[error("Room {0} is not connected; reconnecting")]
    NotConnected(RoomId),

    /// Neither the room channel nor notifications accepted the message
    #[error("Replay request for room {0} was not delivered")]
    NotDelivered(RoomId),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}
