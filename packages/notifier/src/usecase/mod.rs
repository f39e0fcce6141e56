//! UseCase layer: the notification core.

pub mod channel_router;
pub mod connection_multiplexer;
pub mod error;
pub mod ingest;
pub mod operator_actions;
pub mod playback_coordinator;
pub mod snapshot_poller;
pub mod turn_change_detector;

pub use channel_router::ChannelRouter;
pub use connection_multiplexer::{
    ChannelListener, ChannelStats, ConnectionMultiplexer, OutboundMessage,
};
pub use error::OperatorError;
pub use ingest::{BoardRenderer, IngestItem, IngestWorker, SnapshotSource};
pub use operator_actions::OperatorActions;
pub use playback_coordinator::{PlayOutcome, PlaybackCoordinator};
pub use snapshot_poller::SnapshotPoller;
pub use turn_change_detector::TurnChangeDetector;
