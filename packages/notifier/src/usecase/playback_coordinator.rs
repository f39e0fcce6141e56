//! UseCase: 呼び出し音声の再生管理（Playback Coordinator）
//!
//! 診察室ごとに排他ロックを持ち、同じ診察室の再生が重ならないようにします。
//! ロックの確認と取得は 1 つの Mutex ガードの中で行うため、同時に届いた 2 つの
//! 要求のうち開始できるのは 1 つだけです。異なる診察室は互いに独立しています。
//!
//! 1 回の呼び出しは「音声の取得 → repeat_count 回の再生（間に repeat_gap）→ cooldown」
//! の順で進み、どの段階で終わっても（完了・キャンセル・エラー）ロックは解放されます。
//! 再生中のクリップを強制停止することはなく、キャンセルは次の再生の開始前に判定されます。

use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    config::PlaybackSettings,
    domain::{AudioPlayer, QueueApi, RoomId},
};

/// 再生要求の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// 再生シーケンスを開始した
    Started,
    /// 同じ診察室の再生中のため拒否した（キューには入れない）
    Busy,
    /// セッションが無効化されている
    Inactive,
}

pub struct PlaybackCoordinator {
    api: Arc<dyn QueueApi>,
    player: Arc<dyn AudioPlayer>,
    settings: PlaybackSettings,
    locks: Mutex<HashSet<RoomId>>,
    cancel: CancellationToken,
}

impl PlaybackCoordinator {
    /// 新しい PlaybackCoordinator を作成
    ///
    /// # Arguments
    ///
    /// * `api` - 音声を取得する API
    /// * `player` - 音声を再生する実装
    /// * `settings` - 再生回数・間隔・cooldown
    /// * `cancel` - セッションのキャンセルトークン
    pub fn new(
        api: Arc<dyn QueueApi>,
        player: Arc<dyn AudioPlayer>,
        settings: PlaybackSettings,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            player,
            settings,
            locks: Mutex::new(HashSet::new()),
            cancel,
        })
    }

    /// 番号変化による呼び出し
    pub async fn play(self: &Arc<Self>, room: RoomId) -> PlayOutcome {
        self.start(room, "announcement").await
    }

    /// 明示的な再呼び出し（再生中なら拒否）
    pub async fn replay(self: &Arc<Self>, room: RoomId) -> PlayOutcome {
        self.start(room, "replay").await
    }

    pub async fn is_locked(&self, room: RoomId) -> bool {
        self.locks.lock().await.contains(&room)
    }

    pub async fn locked_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.locks.lock().await.iter().copied().collect();
        rooms.sort();
        rooms
    }

    async fn start(self: &Arc<Self>, room: RoomId, reason: &'static str) -> PlayOutcome {
        if self.cancel.is_cancelled() {
            tracing::debug!("Ignoring {} for room {}: session inactive", reason, room);
            return PlayOutcome::Inactive;
        }

        if !self.locks.lock().await.insert(room) {
            tracing::info!("Ignoring {} for room {}: already playing", reason, room);
            return PlayOutcome::Busy;
        }

        tracing::info!("Starting {} for room {}", reason, room);
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run_sequence(room).await;
            coordinator.locks.lock().await.remove(&room);
            tracing::debug!("Released playback lock for room {}", room);
        });

        PlayOutcome::Started
    }

    async fn run_sequence(&self, room: RoomId) {
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return,
            fetched = self.api.fetch_audio(room) => fetched,
        };
        let clip = match fetched {
            Ok(clip) => clip,
            Err(e) => {
                tracing::warn!("Failed to fetch audio for room {}: {}", room, e);
                return;
            }
        };

        for repeat in 0..self.settings.repeat_count {
            if repeat > 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.repeat_gap) => {}
                }
            }
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Playback for room {} cancelled after {} of {} repeats",
                    room,
                    repeat,
                    self.settings.repeat_count
                );
                return;
            }

            tracing::debug!(
                "Playing room {} ({}/{})",
                room,
                repeat + 1,
                self.settings.repeat_count
            );
            if let Err(e) = self.player.play(room, &clip).await {
                tracing::warn!("Playback failed for room {}: {}", room, e);
                return;
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.settings.release_cooldown) => {}
        }
    }
}
