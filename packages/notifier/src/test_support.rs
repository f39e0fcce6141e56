//! Test doubles shared by the unit tests.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    domain::{
        AudioClip, AudioPlayer, ChannelConnector, ChannelEvent, ChannelLink, ChannelName,
        FetchError, OutboundFrame, PlaybackError, QueueApi, RoomId, RoomTurnSnapshot,
        TransportError, TransportEvent, TurnLabel,
    },
    usecase::ChannelListener,
};

pub fn room(id: u32) -> RoomId {
    RoomId::new(id).unwrap()
}

pub fn snapshot(id: u32, turn: u32, label: &str) -> RoomTurnSnapshot {
    RoomTurnSnapshot::new(room(id), turn, TurnLabel::new(label))
}

/// Poll `condition` every millisecond (of paused time) until it holds
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100_000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition was not met in time");
}

// ========================================
// Transport
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenResult {
    Accept,
    Refuse,
}

struct FakeLink {
    inbound: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

/// Connector whose links are driven by the test
///
/// Accepted links are indexed in the order they were opened.
pub struct FakeConnector {
    script: Mutex<VecDeque<OpenResult>>,
    /// Result once the script is exhausted
    fallback: OpenResult,
    links: Mutex<Vec<FakeLink>>,
    opened_urls: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn accepting() -> Arc<Self> {
        Self::build(Vec::new(), OpenResult::Accept)
    }

    /// Follows `script`, then refuses every further open
    pub fn scripted(script: Vec<OpenResult>) -> Arc<Self> {
        Self::build(script, OpenResult::Refuse)
    }

    fn build(script: Vec<OpenResult>, fallback: OpenResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            links: Mutex::new(Vec::new()),
            opened_urls: Mutex::new(Vec::new()),
        })
    }

    /// Every open attempt, accepted or not
    pub fn open_count(&self) -> usize {
        self.opened_urls.lock().unwrap().len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().unwrap().clone()
    }

    pub fn accepted_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn push(&self, link: usize, event: TransportEvent) {
        let _ = self.links.lock().unwrap()[link].inbound.send(event);
    }

    pub fn push_text(&self, link: usize, text: &str) {
        self.push(
            link,
            TransportEvent::Message(crate::infrastructure::dto::conversion::decode_channel_event(
                text,
            )),
        );
    }

    pub fn close(&self, link: usize, code: u16) {
        self.push(
            link,
            TransportEvent::Closed {
                code,
                reason: String::new(),
            },
        );
    }

    /// Drain the frames written to a link so far
    pub fn sent_frames(&self, link: usize) -> Vec<OutboundFrame> {
        let mut links = self.links.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = links[link].outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[async_trait]
impl ChannelConnector for FakeConnector {
    async fn open(&self, url: &str) -> Result<ChannelLink, TransportError> {
        self.opened_urls.lock().unwrap().push(url.to_string());
        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match result {
            OpenResult::Refuse => Err(TransportError::Connect(format!("refused: {}", url))),
            OpenResult::Accept => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                self.links.lock().unwrap().push(FakeLink {
                    inbound: inbound_tx,
                    outbound: outbound_rx,
                });
                Ok(ChannelLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingListener {
    messages: Mutex<Vec<(ChannelName, ChannelEvent)>>,
    errors: Mutex<Vec<(ChannelName, TransportError)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(ChannelName, ChannelEvent)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(ChannelName, TransportError)> {
        self.errors.lock().unwrap().clone()
    }
}

impl ChannelListener for RecordingListener {
    fn on_message(&self, channel: ChannelName, event: ChannelEvent) {
        self.messages.lock().unwrap().push((channel, event));
    }

    fn on_error(&self, channel: ChannelName, error: &TransportError) {
        self.errors.lock().unwrap().push((channel, error.clone()));
    }
}

// ========================================
// HTTP API
// ========================================

/// Queue API backed by in-memory state
#[derive(Default)]
pub struct FakeQueueApi {
    snapshots: Mutex<Vec<RoomTurnSnapshot>>,
    fail_snapshots: AtomicBool,
    fail_audio: AtomicBool,
    snapshot_fetches: AtomicUsize,
    /// Time each snapshot fetch takes
    snapshot_delay: Mutex<Duration>,
    audio_fetches: Mutex<Vec<RoomId>>,
    advanced: Mutex<Vec<RoomId>>,
}

impl FakeQueueApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_snapshots(&self, snapshots: Vec<RoomTurnSnapshot>) {
        *self.snapshots.lock().unwrap() = snapshots;
    }

    pub fn set_snapshot_delay(&self, delay: Duration) {
        *self.snapshot_delay.lock().unwrap() = delay;
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn fail_audio(&self, fail: bool) {
        self.fail_audio.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.snapshot_fetches.load(Ordering::SeqCst)
    }

    pub fn audio_fetches(&self) -> Vec<RoomId> {
        self.audio_fetches.lock().unwrap().clone()
    }

    pub fn advanced(&self) -> Vec<RoomId> {
        self.advanced.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueApi for FakeQueueApi {
    async fn fetch_snapshots(&self) -> Result<Vec<RoomTurnSnapshot>, FetchError> {
        self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.snapshot_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(FetchError::Request("connection refused".to_string()));
        }
        Ok(self.snapshots.lock().unwrap().clone())
    }

    async fn fetch_audio(&self, room: RoomId) -> Result<AudioClip, FetchError> {
        self.audio_fetches.lock().unwrap().push(room);
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 500,
                url: format!("/consultorios/{}/audio", room),
            });
        }
        Ok(AudioClip::new(vec![room.value() as u8; 4]))
    }

    async fn advance_turn(&self, room: RoomId) -> Result<(), FetchError> {
        self.advanced.lock().unwrap().push(room);
        Ok(())
    }
}

// ========================================
// Audio
// ========================================

/// Player that takes `clip_duration` per play and records when each play started
pub struct RecordingPlayer {
    clip_duration: Duration,
    fail: AtomicBool,
    plays: Mutex<Vec<(RoomId, Instant)>>,
}

impl RecordingPlayer {
    pub fn new(clip_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            clip_duration,
            fail: AtomicBool::new(false),
            plays: Mutex::new(Vec::new()),
        })
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn plays(&self) -> Vec<(RoomId, Instant)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn play_count(&self, room: RoomId) -> usize {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .filter(|(played, _)| *played == room)
            .count()
    }
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, room: RoomId, _clip: &AudioClip) -> Result<(), PlaybackError> {
        self.plays.lock().unwrap().push((room, Instant::now()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Exit("player exited with status 1".to_string()));
        }
        tokio::time::sleep(self.clip_duration).await;
        Ok(())
    }
}
