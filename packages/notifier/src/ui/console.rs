//! Console output for the display and operator binaries.

use crate::{
    domain::{ChannelEvent, ChannelName, RoomTurnSnapshot, TransportError},
    usecase::{BoardRenderer, ChannelListener},
};

use super::formatter::BoardFormatter;

/// Prints the board to stdout whenever it changes
#[derive(Debug, Default)]
pub struct ConsoleBoardRenderer;

impl BoardRenderer for ConsoleBoardRenderer {
    fn render(&self, board: &[RoomTurnSnapshot]) {
        print!("{}", BoardFormatter::format_board(board));
    }
}

/// Prints inbound events on the operator console
#[derive(Debug, Default)]
pub struct ConsoleListener;

impl ChannelListener for ConsoleListener {
    fn on_message(&self, channel: ChannelName, event: ChannelEvent) {
        if matches!(event, ChannelEvent::Ping) {
            return;
        }
        print!("{}", BoardFormatter::format_channel_event(channel, &event));
    }

    fn on_error(&self, channel: ChannelName, error: &TransportError) {
        tracing::warn!("Channel '{}' error: {}", channel, error);
    }
}
