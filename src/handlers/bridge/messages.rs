//! Bridge WebSocket message types.
//!
//! The browser-facing protocol is deliberately tiny. Incoming frames are
//! defined here; outgoing frames live in [`crate::core::outbound`] because
//! the core machinery produces them too, and are re-exported for use at
//! the transport layer.
//!
//! ## Client → Server
//!
//! - **user_text**: text typed by the user, relayed upstream
//! - **close**: polite shutdown
//!
//! Anything else, unknown tags, malformed JSON, or binary frames, is
//! dropped without a reply.

use serde::Deserialize;

pub use crate::core::outbound::{OutboundFrame, ServerMessage};

/// Incoming WebSocket messages from the browser.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Text the user typed, forwarded into the upstream conversation.
    #[serde(rename = "user_text")]
    UserText { text: String },

    /// Explicit session shutdown.
    #[serde(rename = "close")]
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_deserialization() {
        let json = r#"{"type": "user_text", "text": "how do I say hello?"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("should deserialize");
        match msg {
            ClientMessage::UserText { text } => assert_eq!(text, "how do I say hello?"),
            _ => panic!("expected UserText variant"),
        }
    }

    #[test]
    fn test_close_deserialization() {
        let json = r#"{"type": "close"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("should deserialize");
        assert!(matches!(msg, ClientMessage::Close));
    }

    #[test]
    fn test_unknown_client_message_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "jump"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"text": "no tag"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("garbage").is_err());
    }
}
