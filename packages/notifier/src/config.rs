//! Runtime configuration for the notification core.
//!
//! Binaries build a [`NotifierConfig`] from their command-line arguments;
//! the defaults match the deployed front-desk setup.

use std::time::Duration;

use crate::domain::{ChannelName, ReconnectPolicy, RoomId};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ROOMS: [u32; 4] = [1, 2, 3, 4];
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_REPEAT_COUNT: u32 = 2;
const DEFAULT_REPEAT_GAP_MS: u64 = 1000;
const DEFAULT_RELEASE_COOLDOWN_MS: u64 = 2000;

/// Announcement playback settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// How many times a clip is played per announcement
    pub repeat_count: u32,
    /// Pause between two plays of the same announcement
    pub repeat_gap: Duration,
    /// Time the room stays locked after the last repeat finished
    pub release_cooldown: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            repeat_count: DEFAULT_REPEAT_COUNT,
            repeat_gap: Duration::from_millis(DEFAULT_REPEAT_GAP_MS),
            release_cooldown: Duration::from_millis(DEFAULT_RELEASE_COOLDOWN_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// WebSocket base URL; channels live at `{ws_base_url}/{channel}`
    pub ws_base_url: String,
    /// HTTP API base URL
    pub http_base_url: String,
    /// Rooms shown on the display
    pub rooms: Vec<RoomId>,
    pub reconnect: ReconnectPolicy,
    pub poll_interval: Duration,
    pub playback: PlaybackSettings,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self::for_server(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl NotifierConfig {
    /// Derive both base URLs from the backend host and port
    pub fn for_server(host: &str, port: u16) -> Self {
        Self {
            ws_base_url: format!("ws://{}:{}/ws", host, port),
            http_base_url: format!("http://{}:{}", host, port),
            rooms: DEFAULT_ROOMS
                .iter()
                .filter_map(|id| RoomId::new(*id).ok())
                .collect(),
            reconnect: ReconnectPolicy::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            playback: PlaybackSettings::default(),
        }
    }

    /// Every channel the display subscribes to: each room, then notifications
    pub fn display_channels(&self) -> Vec<ChannelName> {
        self.rooms
            .iter()
            .copied()
            .map(ChannelName::Room)
            .chain(std::iter::once(ChannelName::Notifications))
            .collect()
    }
}
