//! Error types for the notification core.

use thiserror::Error;

/// 値オブジェクト生成時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Room ID is not a positive integer
    #[error("Invalid room ID: '{0}'")]
    InvalidRoomId(String),

    /// Channel name is neither a room ID nor "notifications"
    #[error("Invalid channel name: '{0}'")]
    InvalidChannelName(String),
}

/// Transport-level errors (connection refused, I/O failures on an open socket)
///
/// These never reach callers of the multiplexer as `Err`; they are passed to
/// the channel listener and recovered by the reconnect state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be opened
    #[error("Connection error: {0}")]
    Connect(String),

    /// Error on an already-open connection
    #[error("Transport error: {0}")]
    Io(String),
}

/// Errors from the HTTP queue API (snapshot, audio, advance turn)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read
    #[error("Request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// Body was not in the expected format
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Errors while playing an announcement clip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Player process could not be started
    #[error("Failed to start audio player: {0}")]
    Spawn(String),

    /// Feeding the clip to the player failed
    #[error("Audio player I/O error: {0}")]
    Io(String),

    /// Player exited unsuccessfully
    #[error("Audio player exited with {0}")]
    Exit(String),
}
