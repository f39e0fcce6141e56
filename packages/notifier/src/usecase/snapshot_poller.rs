//! UseCase: スナップショットの定期取得（Snapshot Poller）
//!
//! プッシュが届かない間のフォールバックとして、一定間隔で全診察室の状態を取得します。
//! タイマーは動き続けますが、取得するのはセッションが有効で、かつ Connected の
//! チャンネルが 1 つも無いときだけです。取得結果は取り込みキューに入れるだけで、
//! 呼び出しの判断は取り込みワーカーが行います。
//!
//! 取得は常に 1 つずつ行い、取得を始めた順にキューへ入れます。取得中に届いた
//! 再取得要求はまとめて、現在の取得が終わった後に 1 回だけ取得し直します。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - start / stop の冪等性
//! - 接続状況によるポーリングの有効・無効
//! - refresh_now の結果がキューに入ること、失敗時にタイマーが再開されること
//!
//! ### どのような状況を想定しているか
//! - 正常系：全チャンネル切断中の定期取得
//! - 異常系：API エラー
//! - エッジケース：1 つでも Connected なら取得しない、セッション終了後は開始しない

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::domain::{FetchError, QueueApi};

/// これより短いポーリング間隔は切り上げる
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `request_refresh` の進行状況
#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    /// 取得中に新しい要求が届いた
    dirty: bool,
}

use super::{
    connection_multiplexer::ConnectionMultiplexer,
    ingest::{IngestItem, SnapshotSource},
};

pub struct SnapshotPoller {
    api: Arc<dyn QueueApi>,
    multiplexer: Arc<ConnectionMultiplexer>,
    ingest: mpsc::UnboundedSender<IngestItem>,
    interval: Duration,
    session: CancellationToken,
    /// 動作中のタイマーのトークン
    timer: Mutex<Option<CancellationToken>>,
    /// 取得と取り込みキューへの書き込みを直列化する
    fetch: Mutex<()>,
    refresh: Mutex<RefreshState>,
}

impl SnapshotPoller {
    /// 新しい SnapshotPoller を作成
    ///
    /// # Arguments
    ///
    /// * `api` - スナップショットを取得する API
    /// * `multiplexer` - 接続状況の確認に使う
    /// * `ingest` - 取得結果を書き込む取り込みキュー
    /// * `interval` - ポーリング間隔（[`MIN_POLL_INTERVAL`] 未満は切り上げる）
    /// * `session` - セッションのキャンセルトークン（タイマーは子トークンを持つ）
    pub fn new(
        api: Arc<dyn QueueApi>,
        multiplexer: Arc<ConnectionMultiplexer>,
        ingest: mpsc::UnboundedSender<IngestItem>,
        interval: Duration,
        session: CancellationToken,
    ) -> Arc<Self> {
        if interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                "Poll interval {:?} is too short; using {:?}",
                interval,
                MIN_POLL_INTERVAL
            );
        }
        Arc::new(Self {
            api,
            multiplexer,
            ingest,
            interval: interval.max(MIN_POLL_INTERVAL),
            session,
            timer: Mutex::new(None),
            fetch: Mutex::new(()),
            refresh: Mutex::new(RefreshState::default()),
        })
    }

    /// タイマーを開始（動作中なら何もしない）
    ///
    /// # Returns
    ///
    /// 新しくタイマーを開始した場合は `true`
    pub async fn start(self: &Arc<Self>) -> bool {
        if self.session.is_cancelled() {
            return false;
        }

        let mut timer = self.timer.lock().await;
        if timer.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return false;
        }

        let token = self.session.child_token();
        *timer = Some(token.clone());

        let poller = Arc::clone(self);
        tokio::spawn(async move {
            // タスクがどのように終わっても is_running が false になるようにする
            let _stopped = token.clone().drop_guard();
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 最初の tick は即座に完了するので読み捨てる
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => poller.tick().await,
                }
            }
            tracing::debug!("Snapshot poller timer stopped");
        });

        tracing::info!("Snapshot poller started (every {:?})", self.interval);
        true
    }

    /// タイマーを停止（停止済みなら何もしない）
    ///
    /// # Returns
    ///
    /// 動作中のタイマーを止めた場合は `true`
    pub async fn stop(&self) -> bool {
        match self.timer.lock().await.take() {
            Some(token) => {
                token.cancel();
                tracing::info!("Snapshot poller stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.timer
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// 即座に 1 回取得し、結果を取り込みキューに入れる
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - 取得した診察室の数
    /// * `Err(FetchError)` - 取得失敗（ログ出力済み）
    pub async fn refresh_now(&self) -> Result<usize, FetchError> {
        let _fetching = self.fetch.lock().await;
        let batch = match self.api.fetch_snapshots().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("Snapshot fetch failed: {}", e);
                return Err(e);
            }
        };

        let count = batch.len();
        if self
            .ingest
            .send(IngestItem::Snapshots {
                source: SnapshotSource::Poll,
                batch,
            })
            .is_err()
        {
            tracing::debug!("Ingestion queue closed; dropping {} snapshots", count);
        }
        Ok(count)
    }

    /// バックグラウンドで refresh_now を実行し、失敗した場合はタイマーを開始する
    ///
    /// 取得中に呼ばれた場合は、現在の取得の後にもう 1 回だけ取得する。
    pub fn request_refresh(self: &Arc<Self>) {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut refresh = poller.refresh.lock().await;
                if refresh.in_flight {
                    refresh.dirty = true;
                    tracing::debug!("Refresh already in flight; coalescing");
                    return;
                }
                refresh.in_flight = true;
            }

            loop {
                if poller.refresh_now().await.is_err() && poller.start().await {
                    tracing::info!("Falling back to polling after a failed refresh");
                }

                let mut refresh = poller.refresh.lock().await;
                if !refresh.dirty {
                    refresh.in_flight = false;
                    break;
                }
                refresh.dirty = false;
            }
        });
    }

    async fn tick(&self) {
        if self.session.is_cancelled() {
            return;
        }
        if self.multiplexer.any_connected().await {
            tracing::debug!("Skipping poll: push channels are connected");
            return;
        }

        tracing::debug!("Polling snapshots (no channel connected)");
        let _ = self.refresh_now().await;
    }
}
