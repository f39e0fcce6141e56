//! ドメイン層
//!
//! 診察室（Room）の呼び出し状態と、通知チャンネルの抽象を定義します。
//! Infrastructure 層はここで定義された trait を実装します（依存性の逆転）。

pub mod audio;
pub mod entity;
pub mod error;
pub mod event;
pub mod queue_api;
pub mod reconnect;
pub mod transport;
pub mod value_object;

pub use audio::{AudioClip, AudioPlayer};
pub use entity::{PatientSummary, RoomTurnSnapshot};
pub use error::{FetchError, PlaybackError, TransportError, ValueObjectError};
pub use event::{ChannelEvent, QueueNotice};
pub use queue_api::QueueApi;
pub use reconnect::ReconnectPolicy;
pub use transport::{
    ABNORMAL_CLOSURE, ChannelConnector, ChannelLink, ChannelState, NORMAL_CLOSURE, OutboundFrame,
    TransportEvent,
};
pub use value_object::{ChannelName, RoomId, TurnLabel};
