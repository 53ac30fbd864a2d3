//! Upstream conversational-voice provider adapter.
//!
//! Owns the provider WebSocket on the bridge's behalf: fetches the
//! short-lived signed URL, opens the socket, and normalizes the provider's
//! event zoo into the four kinds the rest of the bridge understands
//! (metadata, audio chunk, interruption, closed). Unrecognized frames are
//! dropped, never errored.

mod client;
mod config;
mod messages;

pub use client::{UpstreamConnection, UpstreamError};
pub use config::{API_KEY_HEADER, SIGNED_URL_PATH, UPSTREAM_DEFAULT_BASE_URL, UpstreamConfig};
pub use messages::{ProviderFrame, UpstreamClientFrame, UpstreamEvent, normalize_frame};
