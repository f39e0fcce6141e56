//! Channel transport trait 定義
//!
//! マルチプレクサが必要とする「チャンネルを開く」インターフェース。
//! WebSocket による具体的な実装は Infrastructure 層が提供します。
//!
//! ## 設計ノート
//!
//! 開いたチャンネルは `ChannelLink` として、送信用の `UnboundedSender` と
//! 受信用の `UnboundedReceiver` の組で表現します。受信側には既にデコード済みの
//! `ChannelEvent` が流れてきます。

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::TransportError, event::ChannelEvent};

/// Close code for an intentional close
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Connection state of a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Disconnected => "DISCONNECTED",
            ChannelState::Connecting => "CONNECTING",
            ChannelState::Connected => "CONNECTED",
            ChannelState::Closing => "CLOSING",
        };
        f.write_str(s)
    }
}

/// Frames written to an open channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Events read from an open channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(ChannelEvent),
    Error(TransportError),
    /// The transport closed; no further events follow
    Closed { code: u16, reason: String },
}

/// An open channel
pub struct ChannelLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens channels to a transport endpoint
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open a channel. Resolves once the transport is open.
    async fn open(&self, url: &str) -> Result<ChannelLink, TransportError>;
}
