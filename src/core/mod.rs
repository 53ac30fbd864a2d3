//! Core bridge machinery: audio framing, turn segmentation, the upstream
//! provider connection and the transcription fallback.

pub mod audio;
pub mod outbound;
pub mod stt;
pub mod turn;
pub mod upstream;

pub use stt::SttClient;
pub use turn::TurnAggregator;
pub use upstream::{UpstreamConfig, UpstreamConnection, UpstreamEvent};
