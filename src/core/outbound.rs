//! Client-bound frames.
//!
//! Everything the bridge emits toward the browser lives here, because both
//! the core machinery (turn aggregator, transcription) and the transport
//! handler produce these frames:
//!
//! - **meta**: opaque provider session metadata
//! - **Binary frames**: one complete WAV file per finished turn
//! - **turn_end**: marks the end of the preceding WAV frame's turn
//! - **ai_text**: transcription of the turn (or a placeholder)
//! - **error**: client-visible failure

use bytes::Bytes;
use serde::Serialize;

/// Outgoing JSON messages to the browser. Turn audio travels separately
/// as binary WAV frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Opaque provider metadata, relayed verbatim.
    #[serde(rename = "meta")]
    Meta { meta: serde_json::Value },

    /// The preceding binary WAV frame completed a turn.
    #[serde(rename = "turn_end")]
    TurnEnd,

    /// Transcription of the finished turn, or the fallback placeholder.
    #[serde(rename = "ai_text")]
    AiText { text: String },

    /// Client-visible failure.
    #[serde(rename = "error")]
    Error { error: String },
}

/// Frame routing for the per-session sender task. Everything destined for
/// the client funnels through one mpsc of these, so client receive order
/// equals enqueue order.
#[derive(Debug)]
pub enum OutboundFrame {
    /// JSON text message.
    Json(ServerMessage),
    /// One complete WAV file (a finished turn).
    Wav(Bytes),
    /// Close the client connection.
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_serialization() {
        let msg = ServerMessage::Meta {
            meta: serde_json::json!({"conversation_id": "c1"}),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"meta""#));
        assert!(json.contains(r#""conversation_id":"c1""#));
    }

    #[test]
    fn test_turn_end_serialization() {
        let json = serde_json::to_string(&ServerMessage::TurnEnd).unwrap();
        assert_eq!(json, r#"{"type":"turn_end"}"#);
    }

    #[test]
    fn test_error_serialization() {
        let msg = ServerMessage::Error {
            error: "upstream unavailable".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""error":"upstream unavailable""#));
    }
}
