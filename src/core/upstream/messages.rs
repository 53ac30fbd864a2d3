//! Conversational-voice provider WebSocket message types.
//!
//! The provider pushes JSON frames over the signed-URL WebSocket. Only a
//! handful of frame kinds matter to the bridge; everything else is parsed
//! into `Unknown` and dropped without error.
//!
//! Server frames (received from provider):
//! - conversation_initiation_metadata - session metadata, relayed verbatim
//! - audio - base64 PCM chunk (payload location varies by event variant)
//! - interruption - the agent was interrupted; the current turn ends now
//! - ping - keepalive, answered with a pong
//!
//! Client frames (sent to provider):
//! - user_message - text typed by the browser user
//! - pong - keepalive reply

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// =============================================================================
// Normalized Events
// =============================================================================

/// Provider frames normalized into the four kinds the bridge session
/// reacts to. Produced by the upstream reader task.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Session metadata, forwarded to the client untouched.
    Metadata(serde_json::Value),
    /// One decoded PCM chunk of the agent's spoken reply.
    AudioChunk(Bytes),
    /// The provider cut the agent off; finalize the current turn.
    Interruption,
    /// The upstream socket is gone (close frame, error, or EOF).
    Closed,
}

// =============================================================================
// Server Frames (provider -> bridge)
// =============================================================================

/// Raw provider frame as received off the wire.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderFrame {
    /// Initial session metadata.
    #[serde(rename = "conversation_initiation_metadata")]
    ConversationInitiationMetadata {
        /// Opaque metadata payload, relayed to the client as-is.
        #[serde(default)]
        conversation_initiation_metadata_event: serde_json::Value,
    },

    /// Audio chunk. The base64 payload has moved between fields across
    /// provider event variants; all three known locations are accepted.
    #[serde(rename = "audio")]
    Audio {
        #[serde(default)]
        audio_event: Option<AudioEvent>,
        #[serde(default)]
        audio_base_64: Option<String>,
        #[serde(default)]
        audio: Option<String>,
    },

    /// The user barged in; the agent's reply is cut short.
    #[serde(rename = "interruption")]
    Interruption,

    /// Keepalive probe.
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        ping_event: Option<PingEvent>,
    },

    /// Anything the bridge does not care about.
    #[serde(other)]
    Unknown,
}

/// Nested audio payload variant.
#[derive(Debug, Deserialize)]
pub struct AudioEvent {
    #[serde(default)]
    pub audio_base_64: Option<String>,
}

/// Ping payload; the event id is echoed back in the pong.
#[derive(Debug, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub event_id: Option<u64>,
}

impl ProviderFrame {
    /// Extract the base64 audio payload from an `Audio` frame.
    ///
    /// Precedence is fixed: nested `audio_event.audio_base_64` first, then
    /// top-level `audio_base_64`, then bare `audio`. Returns `None` for
    /// non-audio frames or audio frames with none of the known fields.
    pub fn audio_payload(&self) -> Option<&str> {
        match self {
            ProviderFrame::Audio {
                audio_event,
                audio_base_64,
                audio,
            } => audio_event
                .as_ref()
                .and_then(|e| e.audio_base_64.as_deref())
                .or(audio_base_64.as_deref())
                .or(audio.as_deref()),
            _ => None,
        }
    }
}

/// Parse a provider text frame into a normalized event.
///
/// Returns `None` for frames the bridge ignores: non-JSON text, unknown
/// frame kinds, audio frames with no recognizable payload, and audio
/// payloads that fail base64 decoding. Pings are handled by the caller
/// (they need a reply) and are not normalized here.
pub fn normalize_frame(text: &str) -> Option<UpstreamEvent> {
    let frame: ProviderFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!("ignoring non-JSON or unrecognized provider frame: {err}");
            return None;
        }
    };

    match frame {
        ProviderFrame::ConversationInitiationMetadata {
            conversation_initiation_metadata_event,
        } => Some(UpstreamEvent::Metadata(
            conversation_initiation_metadata_event,
        )),
        frame @ ProviderFrame::Audio { .. } => match frame.audio_payload() {
            Some(b64) => match BASE64_STANDARD.decode(b64) {
                Ok(pcm) => Some(UpstreamEvent::AudioChunk(Bytes::from(pcm))),
                Err(err) => {
                    tracing::debug!("ignoring audio frame with undecodable payload: {err}");
                    None
                }
            },
            None => {
                tracing::debug!("ignoring audio frame with no known payload field");
                None
            }
        },
        ProviderFrame::Interruption => Some(UpstreamEvent::Interruption),
        ProviderFrame::Ping { .. } | ProviderFrame::Unknown => None,
    }
}

// =============================================================================
// Client Frames (bridge -> provider)
// =============================================================================

/// Frames the bridge sends upstream.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum UpstreamClientFrame {
    /// Text typed by the browser user, relayed into the conversation.
    #[serde(rename = "user_message")]
    UserMessage { text: String },

    /// Keepalive reply to a provider ping.
    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<u64>,
    },
}
