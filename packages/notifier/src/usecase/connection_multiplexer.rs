//! UseCase: 複数チャンネルの接続管理（Connection Multiplexer）
//!
//! 診察室ごとのチャンネルと共有の notifications チャンネルを、それぞれ独立した
//! 接続として管理します。チャンネルごとに 1 つのタスクが接続・受信・再接続を担当し、
//! 状態はマルチプレクサのマップに書き戻されます。
//!
//! ## 状態遷移
//!
//! ```text
//! (connect) → Connecting → (open) → Connected
//! Connected → (close ≠ 1000, active) → Connecting（backoff 待ち）→ ...
//! Connected → (close = 1000 / inactive / 上限到達) → Disconnected
//! 任意の状態 → (disconnect) → Closing → マップから削除
//! ```
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - connect の冪等性、send の成否、disconnect / disconnect_all
//! - 異常終了時の再接続と backoff（base × 2^attempt）、open 成功時のリセット
//!
//! ### なぜこのテストが必要か
//! - 同じチャンネルへの重複接続やタイマーの取り残しはメモリリークと二重通知の原因になる
//! - 再接続間隔が単調増加し、成功でリセットされることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続・送信・明示的な切断
//! - 異常系：異常終了の連続、接続拒否、再接続上限到達
//! - エッジケース：未接続チャンネルへの送信、非アクティブ時の connect

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ABNORMAL_CLOSURE, ChannelConnector, ChannelEvent, ChannelLink, ChannelName, ChannelState,
    NORMAL_CLOSURE, OutboundFrame, ReconnectPolicy, TransportError, TransportEvent,
    reconnect::{is_normal_closure, should_attempt_reconnect},
};

/// チャンネルからの受信を処理するハンドラ
///
/// 同じチャンネルのメッセージは到着順に呼び出される。
pub trait ChannelListener: Send + Sync {
    fn on_message(&self, channel: ChannelName, event: ChannelEvent);

    /// 通知のみ。再接続の判断はクローズ時にだけ行う。
    fn on_error(&self, channel: ChannelName, error: &TransportError);
}

/// 送信メッセージ（JSON はここでテキストにエンコードされる）
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Json(serde_json::Value),
}

impl OutboundMessage {
    pub fn into_text(self) -> String {
        match self {
            OutboundMessage::Text(text) => text,
            OutboundMessage::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        OutboundMessage::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        OutboundMessage::Text(text.to_string())
    }
}

impl From<serde_json::Value> for OutboundMessage {
    fn from(value: serde_json::Value) -> Self {
        OutboundMessage::Json(value)
    }
}

/// 診断用のチャンネル統計（業務ロジックには使わない）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub state: ChannelState,
    pub reconnect_attempts: u32,
    /// 最後にスケジュールされた再接続の待ち時間
    pub last_reconnect_delay: Option<Duration>,
}

struct ChannelEntry {
    /// 同じチャンネル名で作り直された接続と区別するための世代番号
    generation: u64,
    state: ChannelState,
    reconnect_attempts: u32,
    last_reconnect_delay: Option<Duration>,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    cancel: CancellationToken,
}

impl ChannelEntry {
    fn stats(&self) -> ChannelStats {
        ChannelStats {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
            last_reconnect_delay: self.last_reconnect_delay,
        }
    }
}

type ChannelMap = Arc<Mutex<HashMap<ChannelName, ChannelEntry>>>;

/// 複数チャンネルの接続管理
pub struct ConnectionMultiplexer {
    connector: Arc<dyn ChannelConnector>,
    ws_base_url: String,
    policy: ReconnectPolicy,
    /// false の間は新規接続も自動再接続も行わない
    active: Arc<AtomicBool>,
    channels: ChannelMap,
    next_generation: AtomicU64,
}

impl ConnectionMultiplexer {
    /// 新しい ConnectionMultiplexer を作成
    ///
    /// # Arguments
    ///
    /// * `connector` - チャンネルを開く実装（WebSocket など）
    /// * `ws_base_url` - チャンネルのベース URL（`{ws_base_url}/{channel}` に接続する）
    /// * `policy` - 再接続ポリシー
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        ws_base_url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            connector,
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            policy,
            active: Arc::new(AtomicBool::new(true)),
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn channel_url(&self, channel: &ChannelName) -> String {
        format!("{}/{}", self.ws_base_url, channel)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// `disconnect_all` の後に再び接続を許可する
    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("Connection multiplexer activated");
    }

    /// チャンネルに接続
    ///
    /// 接続中（Connecting / Connected）のチャンネルに対しては何もしない。
    /// 再接続を使い切って Disconnected になったチャンネルは作り直す。
    ///
    /// # Returns
    ///
    /// 新しい接続タスクを開始した場合は `true`
    pub async fn connect(&self, channel: ChannelName, listener: Arc<dyn ChannelListener>) -> bool {
        if !self.is_active() {
            tracing::warn!("Multiplexer is inactive; not connecting to '{}'", channel);
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        {
            let mut channels = self.channels.lock().await;
            if let Some(existing) = channels.get(&channel)
                && existing.state != ChannelState::Disconnected
            {
                tracing::debug!(
                    "Channel '{}' already {}; not opening another connection",
                    channel,
                    existing.state
                );
                return false;
            }

            if let Some(stale) = channels.remove(&channel) {
                stale.cancel.cancel();
            }

            channels.insert(
                channel,
                ChannelEntry {
                    generation,
                    state: ChannelState::Connecting,
                    reconnect_attempts: 0,
                    last_reconnect_delay: None,
                    outbound: None,
                    cancel: cancel.clone(),
                },
            );
        }

        let task = ChannelTask {
            channel,
            generation,
            url: self.channel_url(&channel),
            connector: self.connector.clone(),
            policy: self.policy,
            active: self.active.clone(),
            channels: self.channels.clone(),
            listener,
            cancel,
        };
        tokio::spawn(task.run());

        tracing::info!("Connecting to channel '{}'", channel);
        true
    }

    /// チャンネルにメッセージを送信
    ///
    /// # Returns
    ///
    /// Connected のチャンネルに書き込めた場合だけ `true`（`false` は「未配信」であり、エラーではない）
    pub async fn send(&self, channel: ChannelName, message: impl Into<OutboundMessage>) -> bool {
        let text = message.into().into_text();
        let channels = self.channels.lock().await;

        let Some(entry) = channels.get(&channel) else {
            tracing::warn!("Cannot send to '{}': channel is not tracked", channel);
            return false;
        };

        match (&entry.outbound, entry.state) {
            (Some(outbound), ChannelState::Connected) => {
                match outbound.send(OutboundFrame::Text(text)) {
                    Ok(()) => {
                        tracing::debug!("Sent message to channel '{}'", channel);
                        true
                    }
                    Err(e) => {
                        tracing::warn!("Failed to send to '{}': {}", channel, e);
                        false
                    }
                }
            }
            (_, state) => {
                tracing::warn!("Cannot send to '{}': channel is {}", channel, state);
                false
            }
        }
    }

    /// チャンネルを切断（正常終了コード 1000 で閉じ、再接続タイマーも止める）
    ///
    /// # Returns
    ///
    /// 管理下のチャンネルだった場合は `true`
    pub async fn disconnect(&self, channel: ChannelName) -> bool {
        let Some(mut entry) = self.channels.lock().await.remove(&channel) else {
            return false;
        };

        entry.state = ChannelState::Closing;
        if let Some(outbound) = entry.outbound.take() {
            let _ = outbound.send(OutboundFrame::Close {
                code: NORMAL_CLOSURE,
                reason: "intentional disconnect".to_string(),
            });
        }
        entry.cancel.cancel();

        tracing::info!("Disconnected from channel '{}'", channel);
        true
    }

    /// 全チャンネルを切断し、以後の自動再接続を止める
    pub async fn disconnect_all(&self) {
        self.active.store(false, Ordering::SeqCst);

        let channels: Vec<ChannelName> = self.channels.lock().await.keys().copied().collect();
        tracing::info!("Disconnecting all {} channels", channels.len());
        for channel in channels {
            self.disconnect(channel).await;
        }
    }

    pub async fn state(&self, channel: ChannelName) -> ChannelState {
        self.channels
            .lock()
            .await
            .get(&channel)
            .map(|entry| entry.state)
            .unwrap_or(ChannelState::Disconnected)
    }

    /// チャンネルが Connected になるまで待つ（`timeout` を過ぎたら `false`）
    pub async fn wait_connected(&self, channel: ChannelName, timeout: Duration) -> bool {
        let wait = async {
            while self.state(channel).await != ChannelState::Connected {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// いずれかのチャンネルが Connected か
    pub async fn any_connected(&self) -> bool {
        self.channels
            .lock()
            .await
            .values()
            .any(|entry| entry.state == ChannelState::Connected)
    }

    /// 管理下の全チャンネルの統計
    pub async fn stats(&self) -> BTreeMap<ChannelName, ChannelStats> {
        self.channels
            .lock()
            .await
            .iter()
            .map(|(channel, entry)| (*channel, entry.stats()))
            .collect()
    }
}

/// 1 つのチャンネルの接続・受信・再接続を担当するタスク
struct ChannelTask {
    channel: ChannelName,
    generation: u64,
    url: String,
    connector: Arc<dyn ChannelConnector>,
    policy: ReconnectPolicy,
    active: Arc<AtomicBool>,
    channels: ChannelMap,
    listener: Arc<dyn ChannelListener>,
    cancel: CancellationToken,
}

impl ChannelTask {
    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            let opened = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.connector.open(&self.url) => result,
            };

            let (code, reason) = match opened {
                Ok(link) => {
                    attempt = 0;
                    let outbound = link.outbound.clone();
                    let tracked = self
                        .update(|entry| {
                            entry.state = ChannelState::Connected;
                            entry.reconnect_attempts = 0;
                            entry.last_reconnect_delay = None;
                            entry.outbound = Some(outbound);
                        })
                        .await;
                    if !tracked {
                        return;
                    }
                    tracing::info!("Connected to channel '{}' ({})", self.channel, self.url);

                    match self.pump(link).await {
                        Some(closed) => closed,
                        None => return,
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to open channel '{}': {}", self.channel, e);
                    self.listener.on_error(self.channel, &e);
                    (ABNORMAL_CLOSURE, e.to_string())
                }
            };

            tracing::info!(
                "Channel '{}' closed (code {}, reason '{}')",
                self.channel,
                code,
                reason
            );

            let active = self.active.load(Ordering::SeqCst);
            if !should_attempt_reconnect(code, active, attempt, self.policy.max_attempts) {
                if active && !is_normal_closure(code) {
                    tracing::error!(
                        "Giving up on channel '{}' after {} reconnect attempts",
                        self.channel,
                        attempt
                    );
                }
                self.mark_disconnected().await;
                return;
            }

            let delay = self.policy.delay_for(attempt);
            attempt += 1;
            let tracked = self
                .update(|entry| {
                    entry.state = ChannelState::Connecting;
                    entry.outbound = None;
                    entry.reconnect_attempts = attempt;
                    entry.last_reconnect_delay = Some(delay);
                })
                .await;
            if !tracked {
                return;
            }

            tracing::info!(
                "Reconnecting to channel '{}' in {:?} (attempt {}/{})",
                self.channel,
                delay,
                attempt,
                self.policy.max_attempts
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.active.load(Ordering::SeqCst) {
                self.mark_disconnected().await;
                return;
            }
        }
    }

    /// 受信イベントをリスナーへ渡す。クローズ時は (code, reason)、キャンセル時は `None`
    async fn pump(&self, mut link: ChannelLink) -> Option<(u16, String)> {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                event = link.inbound.recv() => event,
            };

            match event {
                Some(TransportEvent::Message(event)) => {
                    tracing::debug!("Message '{}' on channel '{}'", event.kind(), self.channel);
                    self.listener.on_message(self.channel, event);
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::warn!("Error on channel '{}': {}", self.channel, e);
                    self.listener.on_error(self.channel, &e);
                }
                Some(TransportEvent::Closed { code, reason }) => return Some((code, reason)),
                None => return Some((ABNORMAL_CLOSURE, "transport dropped".to_string())),
            }
        }
    }

    /// 自分の世代のエントリを更新する。作り直し・削除済みなら `false`
    async fn update(&self, apply: impl FnOnce(&mut ChannelEntry)) -> bool {
        let mut channels = self.channels.lock().await;
        match channels.get_mut(&self.channel) {
            Some(entry) if entry.generation == self.generation => {
                apply(entry);
                true
            }
            _ => false,
        }
    }

    async fn mark_disconnected(&self) {
        self.update(|entry| {
            entry.state = ChannelState::Disconnected;
            entry.outbound = None;
        })
        .await;
    }
}
