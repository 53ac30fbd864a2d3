//! Speech-to-text fallback for finalized turns.

mod client;
mod config;

pub use client::SttClient;
pub use config::{
    DEFAULT_STT_MODEL, FALLBACK_TRANSCRIPT, STT_DEFAULT_BASE_URL, SttConfig, TRANSCRIPTIONS_PATH,
};
