//! Inbound channel events.
//!
//! Every text frame received on a channel is decoded exactly once, at the
//! transport boundary, into a [`ChannelEvent`]. Consumers match on the
//! closed set of variants; anything the core does not understand ends up in
//! [`ChannelEvent::Unknown`] or [`ChannelEvent::Raw`] and is ignored.

use super::{
    entity::{PatientSummary, RoomTurnSnapshot},
    value_object::{RoomId, TurnLabel},
};

/// Payload shared by all queue-changing events
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueNotice {
    pub room: Option<RoomId>,
    pub patient: Option<PatientSummary>,
    /// The sender asked for an announcement (informational only)
    pub play_audio: bool,
    /// Current turn carried by the event, when the sender included one
    pub turn: Option<(u32, TurnLabel)>,
    pub timestamp: Option<String>,
}

impl QueueNotice {
    /// Derive a snapshot from the event when it carries enough turn data.
    ///
    /// `fallback_room` is the room of the channel the event arrived on; it is
    /// used when the payload itself has no room.
    pub fn snapshot(&self, fallback_room: Option<RoomId>) -> Option<RoomTurnSnapshot> {
        let room = self.room.or(fallback_room)?;
        let (current_turn, label) = self.turn.clone()?;

        let snapshot = RoomTurnSnapshot::new(room, current_turn, label);
        Some(match &self.patient {
            Some(patient) => snapshot.with_patient(patient.clone()),
            None => snapshot,
        })
    }
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// `new_patient`
    NewPatient(QueueNotice),
    /// `turn_changed`
    TurnChanged(QueueNotice),
    /// `lista_abierta`: a room's list was reopened
    ListReopened(QueueNotice),
    /// `turn_reset`
    TurnReset(QueueNotice),
    /// `patient_deleted`
    PatientDeleted(QueueNotice),
    /// `replay`: explicit re-announcement request
    Replay { room: Option<RoomId> },
    /// `audio_ready`
    AudioReady { room: Option<RoomId> },
    /// Server heartbeat (`type: "ping"`)
    Ping,
    /// Generic "something changed" notice (`type: "system_update"`)
    SystemUpdate,
    /// JSON envelope with an action the core does not handle
    Unknown { action: String },
    /// Non-JSON text frame, passed through untouched
    Raw(String),
}

impl ChannelEvent {
    /// The queue-changing payload, if this event changes queue state
    pub fn queue_notice(&self) -> Option<&QueueNotice> {
        match self {
            ChannelEvent::NewPatient(notice)
            | ChannelEvent::TurnChanged(notice)
            | ChannelEvent::ListReopened(notice)
            | ChannelEvent::TurnReset(notice)
            | ChannelEvent::PatientDeleted(notice) => Some(notice),
            _ => None,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &str {
        match self {
            ChannelEvent::NewPatient(_) => "new_patient",
            ChannelEvent::TurnChanged(_) => "turn_changed",
            ChannelEvent::ListReopened(_) => "lista_abierta",
            ChannelEvent::TurnReset(_) => "turn_reset",
            ChannelEvent::PatientDeleted(_) => "patient_deleted",
            ChannelEvent::Replay { .. } => "replay",
            ChannelEvent::AudioReady { .. } => "audio_ready",
            ChannelEvent::Ping => "ping",
            ChannelEvent::SystemUpdate => "system_update",
            ChannelEvent::Unknown { action } => action,
            ChannelEvent::Raw(_) => "raw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: u32) -> RoomId {
        RoomId::new(id).unwrap()
    }

    #[test]
    fn test_snapshot_uses_payload_room() {
        // テスト項目: ペイロードの room がチャンネルの room より優先される
        // given (前提条件):
        let notice = QueueNotice {
            room: Some(room(2)),
            turn: Some((4, TurnLabel::new("R2-04"))),
            ..Default::default()
        };

        // when (操作):
        let snapshot = notice.snapshot(Some(room(1))).unwrap();

        // then (期待する結果):
        assert_eq!(snapshot.room, room(2));
        assert_eq!(snapshot.current_turn, 4);
        assert_eq!(snapshot.label, TurnLabel::new("R2-04"));
    }

    #[test]
    fn test_snapshot_falls_back_to_channel_room() {
        // テスト項目: ペイロードに room が無い場合はチャンネルの room を使う
        // given (前提条件):
        let notice = QueueNotice {
            turn: Some((1, TurnLabel::new("R1-01"))),
            ..Default::default()
        };

        // when (操作):
        let snapshot = notice.snapshot(Some(room(1)));

        // then (期待する結果):
        assert_eq!(snapshot.map(|s| s.room), Some(room(1)));
    }

    #[test]
    fn test_snapshot_requires_turn_data() {
        // テスト項目: 番号情報が無いイベントからはスナップショットを作らない
        // given (前提条件):
        let notice = QueueNotice {
            room: Some(room(1)),
            play_audio: true,
            ..Default::default()
        };

        // when (操作):
        let snapshot = notice.snapshot(None);

        // then (期待する結果):
        assert!(snapshot.is_none());
    }

    #[test]
    fn test_queue_notice_only_for_queue_events() {
        // テスト項目: キュー状態を変えるイベントだけが QueueNotice を持つ
        // given (前提条件):
        let turn_changed = ChannelEvent::TurnChanged(QueueNotice::default());
        let replay = ChannelEvent::Replay { room: None };
        let raw = ChannelEvent::Raw("hello".to_string());

        // when (操作):
        // then (期待する結果):
        assert!(turn_changed.queue_notice().is_some());
        assert!(replay.queue_notice().is_none());
        assert!(raw.queue_notice().is_none());
    }
}
