//! エンティティ
//!
//! スナップショットは観測ごとに丸ごと置き換えられる不変の値として扱う。

use super::value_object::{RoomId, TurnLabel};

/// 呼び出し中の患者の概要
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatientSummary {
    pub full_name: Option<String>,
    /// 診察中かどうか
    pub in_attention: bool,
    pub turn_label: Option<String>,
}

/// ある診察室の呼び出し状態（ある時点のスナップショット）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTurnSnapshot {
    pub room: RoomId,
    /// 表示用の診察室名（例: "Consultorio 1"）
    pub room_label: String,
    /// 現在の番号（0 はまだ呼び出しを開始していないことを表す）
    pub current_turn: u32,
    pub label: TurnLabel,
    pub patient: Option<PatientSummary>,
}

impl RoomTurnSnapshot {
    pub fn new(room: RoomId, current_turn: u32, label: TurnLabel) -> Self {
        Self {
            room,
            room_label: format!("Room {}", room),
            current_turn,
            label,
            patient: None,
        }
    }

    pub fn with_room_label(mut self, room_label: impl Into<String>) -> Self {
        self.room_label = room_label.into();
        self
    }

    pub fn with_patient(mut self, patient: PatientSummary) -> Self {
        self.patient = Some(patient);
        self
    }

    /// 呼び出しを開始している（番号が 1 以上）か
    pub fn is_serving(&self) -> bool {
        self.current_turn > 0
    }
}
