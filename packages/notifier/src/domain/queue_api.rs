//! Queue API trait 定義
//!
//! 受付システムの HTTP API のうち、通知コアが呼び出す部分だけを抽象化します。

use async_trait::async_trait;

use super::{
    audio::AudioClip, entity::RoomTurnSnapshot, error::FetchError, value_object::RoomId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// 全診察室の呼び出し状態を取得
    async fn fetch_snapshots(&self) -> Result<Vec<RoomTurnSnapshot>, FetchError>;

    /// 診察室の呼び出し音声を取得（毎回取得し直す）
    async fn fetch_audio(&self, room: RoomId) -> Result<AudioClip, FetchError>;

    /// 診察室の番号を次に進める
    async fn advance_turn(&self, room: RoomId) -> Result<(), FetchError>;
}
