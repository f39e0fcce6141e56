//! WebSocket message DTOs.
//!
//! Field aliases accept the names used by the deployed backend
//! (`consultorio_id`, `playAudio`, `paciente`, ...).

use serde::{Deserialize, Serialize};

/// Patient object as sent by the backend
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PatientDto {
    #[serde(default, alias = "nombre_completo")]
    pub full_name: Option<String>,
    #[serde(default, alias = "en_atencion")]
    pub in_attention: Option<bool>,
    #[serde(default, alias = "turno_label")]
    pub turn_label: Option<String>,
}

/// Inbound envelope: `{ action, room_id?, patient?, play_audio?, timestamp? }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub action: Option<String>,
    /// Heartbeats and system notices use `type` instead of `action`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Number or numeric string
    #[serde(default, alias = "consultorio_id")]
    pub room_id: Option<serde_json::Value>,
    #[serde(default, alias = "paciente")]
    pub patient: Option<PatientDto>,
    #[serde(default, alias = "playAudio")]
    pub play_audio: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub current_turn: Option<u32>,
    #[serde(default)]
    pub current_turn_label: Option<String>,
}

/// Outbound action names
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboundAction {
    Replay,
    TurnChanged,
}

/// `{ action: "replay", room_id, timestamp }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayRequestMessage {
    pub action: OutboundAction,
    pub room_id: u32,
    pub timestamp: String,
    /// Channel the request originated from (set on the notifications copy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_room: Option<String>,
}

/// `{ action: "turn_changed", room_id, play_audio: true, timestamp }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnChangedMessage {
    pub action: OutboundAction,
    pub room_id: u32,
    pub play_audio: bool,
    pub timestamp: String,
}

impl ReplayRequestMessage {
    pub fn new(room_id: u32, timestamp: String) -> Self {
        Self {
            action: OutboundAction::Replay,
            room_id,
            timestamp,
            target_room: None,
        }
    }

    /// Copy addressed to the shared notifications channel
    pub fn for_notifications(&self) -> Self {
        Self {
            target_room: Some(self.room_id.to_string()),
            ..self.clone()
        }
    }
}

impl TurnChangedMessage {
    /// Turn change that asks displays to announce
    pub fn announce(room_id: u32, timestamp: String) -> Self {
        Self {
            action: OutboundAction::TurnChanged,
            room_id,
            play_audio: true,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_request_wire_format() {
        // テスト項目: 再呼び出し要求は { action: "replay", room_id, timestamp } で送られる
        // given (前提条件):
        let message = ReplayRequestMessage::new(2, "2024-01-01T00:00:00.000Z".to_string());

        // when (操作):
        let json = serde_json::to_value(&message).unwrap();
        let notifications = serde_json::to_value(message.for_notifications()).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "action": "replay",
                "room_id": 2,
                "timestamp": "2024-01-01T00:00:00.000Z"
            })
        );
        assert_eq!(notifications["target_room"], "2");
    }

    #[test]
    fn test_turn_changed_wire_format() {
        // テスト項目: 番号変更通知は play_audio: true を含む
        // given (前提条件):
        let message = TurnChangedMessage::announce(1, "2024-01-01T00:00:00.000Z".to_string());

        // when (操作):
        let json = serde_json::to_value(&message).unwrap();

        // then (期待する結果):
        assert_eq!(json["action"], "turn_changed");
        assert_eq!(json["play_audio"], true);
        assert_eq!(json["room_id"], 1);
    }

    #[test]
    fn test_envelope_accepts_backend_aliases() {
        // テスト項目: paciente / nombre_completo などの別名を受け付ける
        // given (前提条件):
        let text = r#"{"action":"new_patient","consultorio_id":3,"paciente":{"nombre_completo":"Luis","en_atencion":false}}"#;

        // when (操作):
        let envelope: InboundEnvelope = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        assert_eq!(envelope.room_id, Some(serde_json::json!(3)));
        assert_eq!(
            envelope.patient.unwrap().full_name.as_deref(),
            Some("Luis")
        );
    }
}
