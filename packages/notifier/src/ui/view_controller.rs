//! 表示画面の有効化・無効化（View Activation Controller）
//!
//! 画面が前面に来るたびに新しいセッションを作り、チャンネル接続・ポーリング・
//! 取り込みワーカー・再生管理を起動します。セッションは番号の記録と再生ロックを
//! 持つため、再有効化すると必ず空の状態から始まり、最初のバッチは無音になります。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - activate / deactivate のライフサイクルと冪等性
//! - 再有効化時に記録がリセットされること
//! - 無効化中の再生キャンセル、stats の内容
//!
//! ### どのような状況を想定しているか
//! - 正常系：表示 → 番号変化 → 呼び出し
//! - 異常系：全チャンネル切断中のポーリング
//! - エッジケース：再生中の無効化（シナリオ D）、再有効化直後のバッチ

use std::{collections::BTreeMap, sync::Arc};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::NotifierConfig,
    domain::{AudioPlayer, ChannelConnector, ChannelName, QueueApi, RoomId},
    usecase::{
        BoardRenderer, ChannelRouter, ChannelStats, ConnectionMultiplexer, IngestItem,
        IngestWorker, PlaybackCoordinator, SnapshotPoller,
    },
};

/// 画面の状態（診断用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewStats {
    pub active: bool,
    pub session_id: Option<Uuid>,
    pub channels: BTreeMap<ChannelName, ChannelStats>,
    /// 再生ロック中の診察室
    pub locked_rooms: Vec<RoomId>,
    pub polling: bool,
}

/// 1 回の有効化に対応するセッション
struct ViewSession {
    id: Uuid,
    cancel: CancellationToken,
    ingest: mpsc::UnboundedSender<IngestItem>,
    coordinator: Arc<PlaybackCoordinator>,
    poller: Arc<SnapshotPoller>,
    worker: JoinHandle<()>,
}

pub struct ViewActivationController {
    config: NotifierConfig,
    api: Arc<dyn QueueApi>,
    player: Arc<dyn AudioPlayer>,
    renderer: Arc<dyn BoardRenderer>,
    multiplexer: Arc<ConnectionMultiplexer>,
    session: Mutex<Option<ViewSession>>,
}

impl ViewActivationController {
    /// 新しい ViewActivationController を作成
    ///
    /// # Arguments
    ///
    /// * `config` - 接続先・診察室・再生設定
    /// * `connector` - チャンネルを開く実装
    /// * `api` - 受付システムの API
    /// * `player` - 音声の再生
    /// * `renderer` - ボードの描画
    pub fn new(
        config: NotifierConfig,
        connector: Arc<dyn ChannelConnector>,
        api: Arc<dyn QueueApi>,
        player: Arc<dyn AudioPlayer>,
        renderer: Arc<dyn BoardRenderer>,
    ) -> Self {
        let multiplexer = Arc::new(ConnectionMultiplexer::new(
            connector,
            config.ws_base_url.clone(),
            config.reconnect,
        ));
        Self {
            config,
            api,
            player,
            renderer,
            multiplexer,
            session: Mutex::new(None),
        }
    }

    /// 画面のチャンネルを共有するマルチプレクサ（オペレーター操作用）
    pub fn multiplexer(&self) -> Arc<ConnectionMultiplexer> {
        self.multiplexer.clone()
    }

    /// 画面を有効化する
    ///
    /// # Returns
    ///
    /// 新しいセッションを開始した場合は `true`（有効化済みなら何もしない）
    pub async fn activate(&self) -> bool {
        let mut session = self.session.lock().await;
        if session.is_some() {
            tracing::debug!("View already active");
            return false;
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (ingest, items) = mpsc::unbounded_channel();

        let coordinator = PlaybackCoordinator::new(
            self.api.clone(),
            self.player.clone(),
            self.config.playback,
            cancel.child_token(),
        );
        let poller = SnapshotPoller::new(
            self.api.clone(),
            self.multiplexer.clone(),
            ingest.clone(),
            self.config.poll_interval,
            cancel.clone(),
        );
        let router = Arc::new(ChannelRouter::new(ingest.clone(), self.config.rooms.clone()));

        let worker = IngestWorker::new(
            self.config.rooms.clone(),
            coordinator.clone(),
            poller.clone(),
            self.renderer.clone(),
        );
        let worker = tokio::spawn(worker.run(items, cancel.child_token()));

        self.multiplexer.activate();
        for channel in self.config.display_channels() {
            self.multiplexer.connect(channel, router.clone()).await;
        }
        poller.start().await;
        poller.request_refresh();

        tracing::info!(
            "View activated (session {}, {} rooms)",
            id,
            self.config.rooms.len()
        );
        *session = Some(ViewSession {
            id,
            cancel,
            ingest,
            coordinator,
            poller,
            worker,
        });
        true
    }

    /// 画面を無効化する
    ///
    /// 再生中のクリップは最後まで再生されるが、次の繰り返しは始まらない。
    ///
    /// # Returns
    ///
    /// 有効なセッションを終了した場合は `true`
    pub async fn deactivate(&self) -> bool {
        let Some(session) = self.session.lock().await.take() else {
            return false;
        };

        session.cancel.cancel();
        self.multiplexer.disconnect_all().await;
        session.poller.stop().await;
        if let Err(e) = session.worker.await {
            tracing::warn!("Ingestion worker ended abnormally: {}", e);
        }

        tracing::info!("View deactivated (session {})", session.id);
        true
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// 全診察室を再取得する
    ///
    /// # Returns
    ///
    /// 有効なセッションが無い場合は `false`
    pub async fn refresh(&self) -> bool {
        match self.session.lock().await.as_ref() {
            Some(session) => session.ingest.send(IngestItem::Refresh).is_ok(),
            None => false,
        }
    }

    pub async fn stats(&self) -> ViewStats {
        let channels = self.multiplexer.stats().await;
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(session) => ViewStats {
                active: true,
                session_id: Some(session.id),
                channels,
                locked_rooms: session.coordinator.locked_rooms().await,
                polling: session.poller.is_running().await,
            },
            None => ViewStats {
                active: false,
                session_id: None,
                channels,
                locked_rooms: Vec::new(),
                polling: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex as StdMutex, time::Duration};

    use super::*;
    use crate::{
        domain::{ABNORMAL_CLOSURE, ChannelState, ReconnectPolicy, RoomTurnSnapshot},
        test_support::{
            FakeConnector, FakeQueueApi, RecordingPlayer, room, snapshot, wait_until,
        },
    };

    const CLIP: Duration = Duration::from_millis(500);

    #[derive(Default)]
    struct RecordingRenderer {
        renders: StdMutex<Vec<Vec<RoomTurnSnapshot>>>,
    }

    impl RecordingRenderer {
        fn count(&self) -> usize {
            self.renders.lock().unwrap().len()
        }
    }

    impl BoardRenderer for RecordingRenderer {
        fn render(&self, board: &[RoomTurnSnapshot]) {
            self.renders.lock().unwrap().push(board.to_vec());
        }
    }

    struct Fixture {
        connector: Arc<FakeConnector>,
        api: Arc<FakeQueueApi>,
        player: Arc<RecordingPlayer>,
        renderer: Arc<RecordingRenderer>,
        controller: ViewActivationController,
    }

    fn create_fixture(connector: Arc<FakeConnector>) -> Fixture {
        let mut config = NotifierConfig::for_server("test", 8000);
        config.rooms = vec![room(1), room(2)];
        config.reconnect = ReconnectPolicy::new(Duration::from_secs(1), 2);

        let api = FakeQueueApi::new();
        api.set_snapshots(vec![snapshot(1, 5, "A-05"), snapshot(2, 1, "B-01")]);
        let player = RecordingPlayer::new(CLIP);
        let renderer = Arc::new(RecordingRenderer::default());
        let controller = ViewActivationController::new(
            config,
            connector.clone(),
            api.clone(),
            player.clone(),
            renderer.clone(),
        );
        Fixture {
            connector,
            api,
            player,
            renderer,
            controller,
        }
    }

    async fn activate_and_settle(fixture: &Fixture) {
        let rendered = fixture.renderer.count();
        fixture.controller.activate().await;
        wait_until(|| async { fixture.renderer.count() > rendered }).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_connects_every_channel_and_refreshes() {
        // テスト項目: 有効化で全診察室 + notifications に接続し、初回取得を行う
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());

        // when (操作):
        let activated = fixture.controller.activate().await;

        // then (期待する結果):
        assert!(activated);
        wait_until(|| async { fixture.connector.accepted_count() == 3 }).await;
        wait_until(|| async { fixture.renderer.count() == 1 }).await;
        let mut urls = fixture.connector.opened_urls();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "ws://test:8000/ws/1",
                "ws://test:8000/ws/2",
                "ws://test:8000/ws/notifications"
            ]
        );
        let stats = fixture.controller.stats().await;
        assert!(stats.active);
        assert!(stats.session_id.is_some());
        assert!(stats.polling);
        // 最初のバッチは無音
        assert!(fixture.player.plays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_is_idempotent() {
        // テスト項目: 有効化済みの画面を再度有効化しても接続は増えない
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        fixture.controller.activate().await;

        // when (操作):
        let again = fixture.controller.activate().await;

        // then (期待する結果):
        assert!(!again);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fixture.connector.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_turn_change_is_announced_once() {
        // テスト項目: 診察室チャンネルと notifications の両方に届いた変化でも呼び出しは 1 回（2 回再生）
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        activate_and_settle(&fixture).await;
        wait_until(|| async { fixture.connector.accepted_count() == 3 }).await;
        fixture
            .api
            .set_snapshots(vec![snapshot(1, 6, "A-06"), snapshot(2, 1, "B-01")]);

        // when (操作): 同じ通知が 2 つのチャンネルに届く
        let text = r#"{"action":"turn_changed","room_id":1,"play_audio":true}"#;
        for link in 0..3 {
            fixture.connector.push_text(link, text);
        }

        // then (期待する結果):
        wait_until(|| async { fixture.player.play_count(room(1)) == 2 }).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fixture.player.play_count(room(1)), 2);
        assert_eq!(fixture.player.play_count(room(2)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_resets_history() {
        // テスト項目: 再有効化後の最初のバッチは、変化していても無音（シナリオ A の再有効化）
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        activate_and_settle(&fixture).await;
        fixture.controller.deactivate().await;
        fixture
            .api
            .set_snapshots(vec![snapshot(1, 9, "A-09"), snapshot(2, 4, "B-04")]);

        // when (操作):
        activate_and_settle(&fixture).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        // then (期待する結果):
        assert!(fixture.player.plays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_during_playback_stops_repeats() {
        // テスト項目: 1 回目の再生中に無効化すると 2 回目は再生されず、ロックも残らない（シナリオ D）
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        activate_and_settle(&fixture).await;
        wait_until(|| async { fixture.connector.accepted_count() == 3 }).await;
        fixture
            .connector
            .push_text(0, r#"{"action":"replay","room_id":1}"#);
        wait_until(|| async { !fixture.player.plays().is_empty() }).await;

        // when (操作):
        let deactivated = fixture.controller.deactivate().await;

        // then (期待する結果):
        assert!(deactivated);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fixture.player.plays().len(), 1);
        let stats = fixture.controller.stats().await;
        assert!(!stats.active);
        assert!(stats.locked_rooms.is_empty());
        assert!(stats.channels.is_empty());
        assert!(!stats.polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_while_playing_is_refused_and_lock_is_reported() {
        // テスト項目: 再生中の再呼び出しは拒否され、stats にはロック中の診察室が表示される（シナリオ B）
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        activate_and_settle(&fixture).await;
        wait_until(|| async { fixture.connector.accepted_count() == 3 }).await;
        let replay = r#"{"action":"replay","room_id":1}"#;
        fixture.connector.push_text(0, replay);
        wait_until(|| async { !fixture.player.plays().is_empty() }).await;

        // when (操作):
        fixture.connector.push_text(0, replay);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // then (期待する結果):
        let stats = fixture.controller.stats().await;
        assert_eq!(stats.locked_rooms, vec![room(1)]);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fixture.player.play_count(room(1)), 2);
        assert!(fixture.controller.stats().await.locked_rooms.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_stops_reconnects() {
        // テスト項目: 無効化後は異常終了したチャンネルも再接続されない
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());
        activate_and_settle(&fixture).await;
        wait_until(|| async { fixture.connector.accepted_count() == 3 }).await;

        // when (操作):
        fixture.controller.deactivate().await;
        for link in 0..3 {
            fixture.connector.close(link, ABNORMAL_CLOSURE);
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        // then (期待する結果):
        assert_eq!(fixture.connector.open_count(), 3);
        assert!(!fixture.controller.deactivate().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_takes_over_when_all_channels_are_down() {
        // テスト項目: 全チャンネルが接続できない間はポーリングで変化を検出する
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::scripted(vec![]));
        activate_and_settle(&fixture).await;
        fixture
            .api
            .set_snapshots(vec![snapshot(1, 5, "A-05"), snapshot(2, 2, "B-02")]);

        // when (操作):
        tokio::time::sleep(Duration::from_secs(11)).await;

        // then (期待する結果):
        wait_until(|| async { fixture.player.play_count(room(2)) == 2 }).await;
        assert!(fixture.api.snapshot_fetches() >= 2);
        let stats = fixture.controller.stats().await;
        assert!(
            stats
                .channels
                .values()
                .all(|channel| channel.state != ChannelState::Connected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_requires_active_view() {
        // テスト項目: refresh は有効な画面でのみ受け付けられる
        // given (前提条件):
        let fixture = create_fixture(FakeConnector::accepting());

        // when (操作):
        let before = fixture.controller.refresh().await;
        activate_and_settle(&fixture).await;
        let fetches = fixture.api.snapshot_fetches();
        let after = fixture.controller.refresh().await;

        // then (期待する結果):
        assert!(!before);
        assert!(after);
        wait_until(|| async { fixture.api.snapshot_fetches() == fetches + 1 }).await;
    }
}
