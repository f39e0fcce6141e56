//! Conversion logic between DTOs and domain entities.

use crate::domain::{
    ChannelEvent, PatientSummary, QueueNotice, RoomId, RoomTurnSnapshot, TurnLabel,
    ValueObjectError,
};
use crate::infrastructure::dto::{
    http::RoomTurnRowDto,
    websocket::{InboundEnvelope, PatientDto},
};

// ========================================
// Text frame → ChannelEvent
// ========================================

/// Decode an inbound text frame.
///
/// Non-JSON text (and JSON that is not an object) is passed through as
/// [`ChannelEvent::Raw`]; an object that does not fit the envelope becomes
/// [`ChannelEvent::Unknown`].
pub fn decode_channel_event(text: &str) -> ChannelEvent {
    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => return ChannelEvent::Raw(text.to_string()),
    };

    match serde_json::from_value::<InboundEnvelope>(value) {
        Ok(envelope) => envelope.into(),
        Err(e) => {
            tracing::debug!("Malformed envelope ignored: {}", e);
            ChannelEvent::Unknown {
                action: String::new(),
            }
        }
    }
}

impl From<InboundEnvelope> for ChannelEvent {
    fn from(envelope: InboundEnvelope) -> Self {
        let room = envelope.room_id.as_ref().and_then(parse_room_value);

        let Some(action) = envelope.action.clone() else {
            return match envelope.kind.as_deref() {
                Some("ping") => ChannelEvent::Ping,
                Some("system_update") => ChannelEvent::SystemUpdate,
                other => ChannelEvent::Unknown {
                    action: other.unwrap_or_default().to_string(),
                },
            };
        };

        let notice = QueueNotice {
            room,
            patient: envelope.patient.map(PatientSummary::from),
            play_audio: envelope.play_audio.unwrap_or(false),
            turn: envelope
                .current_turn
                .zip(envelope.current_turn_label.map(TurnLabel::new)),
            timestamp: envelope.timestamp,
        };

        match action.as_str() {
            "new_patient" => ChannelEvent::NewPatient(notice),
            "turn_changed" => ChannelEvent::TurnChanged(notice),
            "lista_abierta" => ChannelEvent::ListReopened(notice),
            "turn_reset" => ChannelEvent::TurnReset(notice),
            "patient_deleted" => ChannelEvent::PatientDeleted(notice),
            "replay" => ChannelEvent::Replay { room },
            "audio_ready" => ChannelEvent::AudioReady { room },
            _ => ChannelEvent::Unknown { action },
        }
    }
}

/// `room_id` arrives either as a number or as a numeric string
fn parse_room_value(value: &serde_json::Value) -> Option<RoomId> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(|n| RoomId::new(n).ok()),
        serde_json::Value::String(s) => s.parse::<RoomId>().ok(),
        _ => None,
    }
}

// ========================================
// DTO → Domain Entity
// ========================================

impl From<PatientDto> for PatientSummary {
    fn from(dto: PatientDto) -> Self {
        Self {
            full_name: dto.full_name,
            in_attention: dto.in_attention.unwrap_or(false),
            turn_label: dto.turn_label,
        }
    }
}

impl TryFrom<RoomTurnRowDto> for RoomTurnSnapshot {
    type Error = ValueObjectError;

    fn try_from(dto: RoomTurnRowDto) -> Result<Self, Self::Error> {
        let room_label = dto.room_label.unwrap_or_default();
        let room = match dto.room_id {
            Some(id) => RoomId::new(id)?,
            None => room_id_from_label(&room_label)
                .ok_or_else(|| ValueObjectError::InvalidRoomId(room_label.clone()))?,
        };
        let current_turn = dto.current_turn.unwrap_or(0);
        let label = dto
            .current_turn_label
            .map(TurnLabel::new)
            .unwrap_or_else(|| TurnLabel::new(format!("{}-{:02}", room, current_turn)));

        let mut snapshot = RoomTurnSnapshot::new(room, current_turn, label);
        if !room_label.is_empty() {
            snapshot = snapshot.with_room_label(room_label);
        }
        if let Some(patient) = dto.patient {
            snapshot = snapshot.with_patient(patient.into());
        }
        Ok(snapshot)
    }
}

/// Room id from the trailing digits of a label such as "Consultorio 3"
pub fn room_id_from_label(label: &str) -> Option<RoomId> {
    let digits_start = label
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    label[digits_start..].parse::<RoomId>().ok()
}
