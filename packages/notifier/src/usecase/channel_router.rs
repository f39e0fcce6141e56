//! UseCase: 受信メッセージの振り分け（Channel Router）
//!
//! 各チャンネルから届いたイベントを取り込みキューの項目に変換します。
//! `play_audio` は再生のきっかけにはしません。再生は番号変化の検出か、
//! 明示的な再呼び出しのどちらかでのみ始まります。

use tokio::sync::mpsc;

use crate::domain::{ChannelEvent, ChannelName, QueueNotice, RoomId, TransportError};

use super::{
    connection_multiplexer::ChannelListener,
    ingest::{IngestItem, SnapshotSource},
};

pub struct ChannelRouter {
    ingest: mpsc::UnboundedSender<IngestItem>,
    /// 再呼び出しを受け付ける診察室
    rooms: Vec<RoomId>,
}

impl ChannelRouter {
    pub fn new(ingest: mpsc::UnboundedSender<IngestItem>, rooms: Vec<RoomId>) -> Self {
        Self { ingest, rooms }
    }

    fn enqueue(&self, item: IngestItem) {
        if self.ingest.send(item).is_err() {
            tracing::debug!("Ingestion queue closed; dropping routed item");
        }
    }

    /// キュー状態が変わった通知
    ///
    /// 番号情報を含むならそのままスナップショットとして、含まないなら再取得を要求する。
    fn on_queue_change(&self, channel: ChannelName, kind: &str, notice: &QueueNotice) {
        match notice.snapshot(channel.room()) {
            Some(snapshot) => {
                tracing::debug!("'{}' on '{}' carries turn {}", kind, channel, snapshot.label);
                self.enqueue(IngestItem::Snapshots {
                    source: SnapshotSource::Push,
                    batch: vec![snapshot],
                });
            }
            None => {
                tracing::debug!("'{}' on '{}'; refreshing snapshots", kind, channel);
                self.enqueue(IngestItem::Refresh);
            }
        }
    }

    fn on_replay(&self, channel: ChannelName, room: Option<RoomId>) {
        match room.or(channel.room()) {
            Some(room) if self.rooms.contains(&room) => {
                tracing::info!("Replay for room {} received on '{}'", room, channel);
                self.enqueue(IngestItem::Replay(room));
            }
            Some(room) => {
                tracing::debug!("Ignoring replay for unconfigured room {}", room);
            }
            None => {
                tracing::debug!("Ignoring replay without a room on '{}'", channel);
            }
        }
    }
}

impl ChannelListener for ChannelRouter {
    fn on_message(&self, channel: ChannelName, event: ChannelEvent) {
        if let Some(notice) = event.queue_notice() {
            self.on_queue_change(channel, event.kind(), notice);
            return;
        }

        match event {
            ChannelEvent::Replay { room } => self.on_replay(channel, room),
            ChannelEvent::Raw(text) if text.trim() == "replay" => self.on_replay(channel, None),
            ChannelEvent::SystemUpdate => {
                tracing::info!("System update on '{}'; refreshing snapshots", channel);
                self.enqueue(IngestItem::Refresh);
            }
            ChannelEvent::AudioReady { room } => {
                tracing::debug!("Audio ready for room {:?} on '{}'", room, channel);
            }
            ChannelEvent::Ping => {
                tracing::trace!("Heartbeat on '{}'", channel);
            }
            other => {
                tracing::debug!("Ignoring '{}' on '{}'", other.kind(), channel);
            }
        }
    }

    fn on_error(&self, channel: ChannelName, error: &TransportError) {
        tracing::warn!("Channel '{}' reported an error: {}", channel, error);
    }
}
