//! Infrastructure 層
//!
//! ドメイン層の trait（`ChannelConnector`, `QueueApi`, `AudioPlayer`）の具体的な実装と、
//! ワイヤ形式の DTO を提供します。

pub mod audio;
pub mod dto;
pub mod http;
pub mod transport;
