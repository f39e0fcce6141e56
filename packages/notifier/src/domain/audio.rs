//! 音声再生 trait 定義

use async_trait::async_trait;

use super::{error::PlaybackError, value_object::RoomId};

/// 呼び出し音声のバイナリ
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioClip(Vec<u8>);

impl AudioClip {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 共有の音声出力
///
/// `play` はクリップの再生が終わるまで完了しない。
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, room: RoomId, clip: &AudioClip) -> Result<(), PlaybackError>;
}
