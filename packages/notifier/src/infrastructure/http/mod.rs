//! HTTP を使った QueueApi 実装

pub mod queue_api;

pub use queue_api::HttpQueueApi;
