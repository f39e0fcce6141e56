//! UseCase: 診察室オペレーターの操作
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - advance_turn(): 番号を進める API 呼び出しと turn_changed 通知の送信
//! - request_replay(): 診察室チャンネルと notifications への replay 送信
//!
//! ### なぜこのテストが必要か
//! - 未接続のまま送信して「成功」と表示してしまうことを防ぐ
//! - API 失敗時に通知を送らないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：両チャンネルに接続済み
//! - 異常系：API エラー、診察室チャンネル未接続
//! - エッジケース：notifications だけ届かない場合も成功とする

use std::sync::Arc;

use madoguchi_shared::time::Clock;
use serde::Serialize;

use crate::{
    domain::{ChannelName, ChannelState, QueueApi, RoomId},
    infrastructure::dto::websocket::{ReplayRequestMessage, TurnChangedMessage},
};

use super::{
    connection_multiplexer::{ChannelListener, ConnectionMultiplexer, OutboundMessage},
    error::OperatorError,
};

/// オペレーター操作のユースケース
pub struct OperatorActions {
    /// 受付システムの API
    api: Arc<dyn QueueApi>,
    multiplexer: Arc<ConnectionMultiplexer>,
    /// 再接続時に登録するリスナー
    listener: Arc<dyn ChannelListener>,
    clock: Arc<dyn Clock>,
}

impl OperatorActions {
    pub fn new(
        api: Arc<dyn QueueApi>,
        multiplexer: Arc<ConnectionMultiplexer>,
        listener: Arc<dyn ChannelListener>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            multiplexer,
            listener,
            clock,
        }
    }

    /// 番号を進め、表示画面に呼び出しを依頼する
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - 番号を進めた。`bool` は turn_changed 通知が届いたか
    /// * `Err(OperatorError)` - API 呼び出しの失敗（通知は送らない）
    pub async fn advance_turn(&self, room: RoomId) -> Result<bool, OperatorError> {
        self.api.advance_turn(room).await?;
        tracing::info!("Advanced turn for room {}", room);

        let message = TurnChangedMessage::announce(room.value(), self.clock.now_rfc3339());
        let delivered = self
            .multiplexer
            .send(ChannelName::Room(room), encode(&message)?)
            .await;
        if !delivered {
            tracing::warn!(
                "Turn for room {} advanced but the change notice was not delivered",
                room
            );
        }
        Ok(delivered)
    }

    /// 表示画面に再呼び出しを依頼する
    ///
    /// 診察室チャンネルが Connected でなければ再接続を要求して `NotConnected` を返す。
    /// 診察室チャンネルと notifications のどちらか一方に届けば成功とする。
    pub async fn request_replay(&self, room: RoomId) -> Result<(), OperatorError> {
        let channel = ChannelName::Room(room);
        if self.multiplexer.state(channel).await != ChannelState::Connected {
            tracing::warn!("Room {} is not connected; requesting reconnect", room);
            self.multiplexer
                .connect(channel, self.listener.clone())
                .await;
            return Err(OperatorError::NotConnected(room));
        }

        let message = ReplayRequestMessage::new(room.value(), self.clock.now_rfc3339());
        let to_room = self.multiplexer.send(channel, encode(&message)?).await;
        let to_notifications = self
            .multiplexer
            .send(
                ChannelName::Notifications,
                encode(&message.for_notifications())?,
            )
            .await;

        if to_room || to_notifications {
            tracing::info!(
                "Replay requested for room {} (room: {}, notifications: {})",
                room,
                to_room,
                to_notifications
            );
            Ok(())
        } else {
            Err(OperatorError::NotDelivered(room))
        }
    }
}

fn encode<T: Serialize>(message: &T) -> Result<OutboundMessage, OperatorError> {
    serde_json::to_value(message)
        .map(OutboundMessage::Json)
        .map_err(|e| OperatorError::Encode(e.to_string()))
}
