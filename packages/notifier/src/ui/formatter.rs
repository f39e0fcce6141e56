//! Text formatting for the "now serving" board and console output.

use std::collections::BTreeMap;

use crate::{
    domain::{ChannelEvent, ChannelName, ChannelState, RoomTurnSnapshot},
    usecase::ChannelStats,
};

const SEPARATOR: &str = "============================================================";
const NOT_SERVING: &str = "—";
const NO_PATIENT: &str = "No patient assigned";

/// Board formatter for console display
pub struct BoardFormatter;

impl BoardFormatter {
    /// Turn number as shown on the board
    ///
    /// # Returns
    ///
    /// The number zero-padded to two digits, or `—` while the room is not serving
    pub fn format_turn(snapshot: &RoomTurnSnapshot) -> String {
        if snapshot.is_serving() {
            format!("{:02}", snapshot.current_turn)
        } else {
            NOT_SERVING.to_string()
        }
    }

    pub fn format_patient(snapshot: &RoomTurnSnapshot) -> String {
        snapshot
            .patient
            .as_ref()
            .and_then(|patient| patient.full_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| NO_PATIENT.to_string())
    }

    /// Format one board row
    pub fn format_row(snapshot: &RoomTurnSnapshot) -> String {
        let in_attention = snapshot
            .patient
            .as_ref()
            .is_some_and(|patient| patient.in_attention);
        format!(
            "{:<16} {:>4}  {:<10} {}{}",
            snapshot.room_label,
            Self::format_turn(snapshot),
            snapshot.label,
            Self::format_patient(snapshot),
            if in_attention { " (in attention)" } else { "" }
        )
    }

    /// Format the whole board
    ///
    /// # Arguments
    ///
    /// * `board` - Latest snapshot of every room, in display order
    pub fn format_board(board: &[RoomTurnSnapshot]) -> String {
        let mut output = String::new();
        output.push_str("\n\n");
        output.push_str(SEPARATOR);
        output.push_str("\nNow serving:\n");

        if board.is_empty() {
            output.push_str("(No rooms)\n");
        } else {
            for snapshot in board {
                output.push_str(&Self::format_row(snapshot));
                output.push('\n');
            }
        }

        output.push_str(SEPARATOR);
        output.push('\n');
        output
    }

    /// Connection status line: `WS: connected/total`, plus the state of every channel that is not connected
    pub fn format_status_line(channels: &BTreeMap<ChannelName, ChannelStats>) -> String {
        let connected = channels
            .values()
            .filter(|stats| stats.state == ChannelState::Connected)
            .count();

        let mut line = format!("WS: {}/{}", connected, channels.len());
        for (channel, stats) in channels {
            if stats.state == ChannelState::Connected {
                continue;
            }
            line.push_str(&format!(" | {}: {}", channel, stats.state));
            if stats.reconnect_attempts > 0 {
                line.push_str(&format!(" (retry {})", stats.reconnect_attempts));
            }
        }
        line
    }

    /// Format an inbound event for the operator console
    pub fn format_channel_event(channel: ChannelName, event: &ChannelEvent) -> String {
        match event {
            ChannelEvent::Raw(text) => format!("\n← [{}] {}\n", channel, text),
            other => match other.queue_notice().and_then(|notice| notice.room) {
                Some(room) => format!("\n← [{}] {} (room {})\n", channel, other.kind(), room),
                None => format!("\n← [{}] {}\n", channel, other.kind()),
            },
        }
    }
}
