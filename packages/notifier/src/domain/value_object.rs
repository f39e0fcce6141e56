//! 値オブジェクト
//!
//! - `RoomId`: 診察室の識別子（正の整数）
//! - `ChannelName`: 購読するチャンネル名（診察室ごと + 共有の notifications）
//! - `TurnLabel`: 変更検知だけに使う不透明な呼び出しラベル

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::ValueObjectError;

/// 診察室 ID
///
/// チャンネルのルーティングキーと、診察室ごとの状態マップのキーを兼ねる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RoomId(u32);

impl RoomId {
    /// 新しい RoomId を作成（0 は不可）
    pub fn new(value: u32) -> Result<Self, ValueObjectError> {
        if value == 0 {
            return Err(ValueObjectError::InvalidRoomId(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomId> for u32 {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl FromStr for RoomId {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| ValueObjectError::InvalidRoomId(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// チャンネル名
///
/// ワイヤ上の表現は診察室なら `"1"`, `"2"`, ...、共有チャンネルは `"notifications"`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelName {
    Room(RoomId),
    Notifications,
}

impl ChannelName {
    const NOTIFICATIONS: &'static str = "notifications";

    /// 診察室チャンネルなら RoomId を返す
    pub fn room(&self) -> Option<RoomId> {
        match self {
            ChannelName::Room(id) => Some(*id),
            ChannelName::Notifications => None,
        }
    }
}

impl From<RoomId> for ChannelName {
    fn from(id: RoomId) -> Self {
        ChannelName::Room(id)
    }
}

impl FromStr for ChannelName {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NOTIFICATIONS {
            return Ok(ChannelName::Notifications);
        }
        s.parse::<RoomId>()
            .map(ChannelName::Room)
            .map_err(|_| ValueObjectError::InvalidChannelName(s.to_string()))
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::Room(id) => write!(f, "{}", id),
            ChannelName::Notifications => f.write_str(Self::NOTIFICATIONS),
        }
    }
}

/// 呼び出しラベル（例: "Consultorio 1 - Turno 05"）
///
/// 変化の判定は等価比較で行う。末尾の数字を除いた部分を系列として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TurnLabel(String);

impl TurnLabel {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 末尾の番号を除いた部分（"A-05" → "A-"）
    pub fn series(&self) -> &str {
        self.0.trim_end_matches(|c: char| c.is_ascii_digit())
    }
}

impl fmt::Display for TurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
