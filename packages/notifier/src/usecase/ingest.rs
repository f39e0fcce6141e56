//! UseCase: 取り込みキューと取り込みワーカー
//!
//! プッシュ由来のスナップショット、ポーリング結果、再呼び出し要求はすべて 1 本の
//! キューに入り、1 つのワーカーが受け取った順に処理します。番号変化の検出器は
//! このワーカーだけが持つため、検出器の状態に対する競合はありません。
//!
//! この画面に割り当てられていない診察室のスナップショットは、ボードにも
//! 呼び出しにも使いません。

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{RoomId, RoomTurnSnapshot};

use super::{
    playback_coordinator::PlaybackCoordinator, snapshot_poller::SnapshotPoller,
    turn_change_detector::TurnChangeDetector,
};

/// スナップショットの取得経路（ログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestItem {
    Snapshots {
        source: SnapshotSource,
        batch: Vec<RoomTurnSnapshot>,
    },
    /// 全診察室の再取得を要求
    Refresh,
    /// 明示的な再呼び出し
    Replay(RoomId),
}

/// 表示中のボードを描画する
pub trait BoardRenderer: Send + Sync {
    fn render(&self, board: &[RoomTurnSnapshot]);
}

pub struct IngestWorker {
    /// この画面が担当する診察室
    rooms: Vec<RoomId>,
    detector: TurnChangeDetector,
    /// 診察室ごとの最新スナップショット
    board: BTreeMap<RoomId, RoomTurnSnapshot>,
    coordinator: Arc<PlaybackCoordinator>,
    poller: Arc<SnapshotPoller>,
    renderer: Arc<dyn BoardRenderer>,
}

impl IngestWorker {
    /// 新しい IngestWorker を作成（検出器は空の状態から始まる）
    pub fn new(
        rooms: Vec<RoomId>,
        coordinator: Arc<PlaybackCoordinator>,
        poller: Arc<SnapshotPoller>,
        renderer: Arc<dyn BoardRenderer>,
    ) -> Self {
        Self {
            rooms,
            detector: TurnChangeDetector::new(),
            board: BTreeMap::new(),
            coordinator,
            poller,
            renderer,
        }
    }

    /// キューが閉じるかセッションがキャンセルされるまで処理を続ける
    pub async fn run(
        mut self,
        mut items: mpsc::UnboundedReceiver<IngestItem>,
        cancel: CancellationToken,
    ) {
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = items.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            self.handle(item).await;
        }
        tracing::debug!("Ingestion worker stopped");
    }

    async fn handle(&mut self, item: IngestItem) {
        match item {
            IngestItem::Snapshots { source, batch } => {
                let received = batch.len();
                let batch: Vec<RoomTurnSnapshot> = batch
                    .into_iter()
                    .filter(|snapshot| self.rooms.contains(&snapshot.room))
                    .filter(|snapshot| !self.detector.is_regression(snapshot))
                    .collect();
                tracing::debug!(
                    "Ingesting {} of {} snapshots from {:?}",
                    batch.len(),
                    received,
                    source
                );
                let announcements = self.detector.observe_batch(&batch);

                for snapshot in batch {
                    self.board.insert(snapshot.room, snapshot);
                }
                let board: Vec<RoomTurnSnapshot> = self.board.values().cloned().collect();
                self.renderer.render(&board);

                for room in announcements {
                    let outcome = self.coordinator.play(room).await;
                    tracing::debug!("Announcement for room {}: {:?}", room, outcome);
                }
            }
            IngestItem::Refresh => self.poller.request_refresh(),
            IngestItem::Replay(room) => {
                let outcome = self.coordinator.replay(room).await;
                tracing::info!("Replay requested for room {}: {:?}", room, outcome);
            }
        }
    }
}
