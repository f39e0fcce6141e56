//! WebSocket を使った ChannelConnector 実装
//!
//! ## 責務
//!
//! - WebSocket 接続の確立（ハンドシェイク完了 = チャンネルのオープン）
//! - 受信フレームのデコード（`ChannelEvent` への変換はここで一度だけ行う）
//! - 送信キューから WebSocket への書き込み
//!
//! ## 設計ノート
//!
//! 接続ごとに読み取りタスクと書き込みタスクを起動し、マルチプレクサとは
//! `mpsc` チャンネルだけでやり取りします。

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode},
};

use crate::{
    domain::{
        ABNORMAL_CLOSURE, ChannelConnector, ChannelLink, OutboundFrame, TransportError,
        TransportEvent,
    },
    infrastructure::dto::conversion::decode_channel_event,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket を使った ChannelConnector 実装
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<ChannelLink, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!("WebSocket handshake completed for {}", url);

        let (sink, stream) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        writer_loop(outbound_rx, sink);
        reader_loop(stream, inbound_tx);

        Ok(ChannelLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Spawns a task that writes queued frames to the WebSocket sink.
///
/// The task ends after a close frame has been written or when every
/// outbound sender has been dropped.
fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut sink: SplitSink<WsStream, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (message, is_close) = match frame {
                OutboundFrame::Text(text) => (Message::Text(text.into()), false),
                OutboundFrame::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    })),
                    true,
                ),
            };

            if let Err(e) = sink.send(message).await {
                tracing::warn!("Failed to write WebSocket frame: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }
    })
}

/// Spawns a task that decodes inbound frames and forwards them as events.
///
/// Always finishes with exactly one `TransportEvent::Closed`.
fn reader_loop(
    mut stream: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<TransportEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let closed = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let event = decode_channel_event(text.as_str());
                    if tx.send(TransportEvent::Message(event)).is_err() {
                        // Nobody is listening anymore
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => TransportEvent::Closed {
                            code: u16::from(frame.code),
                            reason: frame.reason.as_str().to_string(),
                        },
                        None => TransportEvent::Closed {
                            code: u16::from(CloseCode::Status),
                            reason: String::new(),
                        },
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = tx.send(TransportEvent::Error(TransportError::Io(e.to_string())));
                    break abnormal_close("read error");
                }
                None => break abnormal_close("stream ended"),
            }
        };

        let _ = tx.send(closed);
    })
}

fn abnormal_close(reason: &str) -> TransportEvent {
    TransportEvent::Closed {
        code: ABNORMAL_CLOSURE,
        reason: reason.to_string(),
    }
}
