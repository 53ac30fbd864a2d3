//! Best-effort transcription of finalized turns.
//!
//! The WAV frame has already reached the client by the time this runs, so
//! nothing here is allowed to fail loudly: any error (missing key, network
//! fault, non-2xx) collapses to `None` and the caller substitutes a
//! placeholder. The call is dispatched on a detached task and is never
//! awaited by the finalize path.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

use super::config::SttConfig;

/// Response body of the transcription endpoint.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text client for the transcription fallback.
#[derive(Debug, Clone)]
pub struct SttClient {
    http: reqwest::Client,
    config: SttConfig,
}

impl SttClient {
    pub fn new(http: reqwest::Client, config: SttConfig) -> Self {
        Self { http, config }
    }

    /// Transcribe one WAV-framed turn. Returns `None` on any failure.
    pub async fn transcribe(&self, wav: Bytes) -> Option<String> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("transcription skipped: no API key configured");
            return None;
        };

        let file_part = Part::bytes(wav.to_vec())
            .file_name("turn.wav")
            .mime_str("audio/wav")
            .ok()?;
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone());

        let response = match self
            .http
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("transcription request failed: {e}");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("transcription endpoint returned {status}");
            return None;
        }

        match response.json::<TranscriptionResponse>().await {
            Ok(body) => Some(body.text),
            Err(e) => {
                warn!("transcription response unreadable: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server_uri: &str, api_key: Option<&str>) -> SttClient {
        let mut config = SttConfig::new(api_key.map(String::from));
        config.base_url = server_uri.to_string();
        SttClient::new(reqwest::Client::new(), config)
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "hello there"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("test-key"));
        let text = client.transcribe(Bytes::from_static(b"RIFF....")).await;
        assert_eq!(text.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn test_transcribe_non_2xx_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), Some("test-key"));
        assert!(client.transcribe(Bytes::from_static(b"RIFF")).await.is_none());
    }

    #[tokio::test]
    async fn test_transcribe_without_key_yields_none() {
        // No server at all: the missing key must short-circuit before any
        // network activity.
        let client = client_for("http://127.0.0.1:1", None);
        assert!(client.transcribe(Bytes::from_static(b"RIFF")).await.is_none());
    }

    #[tokio::test]
    async fn test_transcribe_network_failure_yields_none() {
        let client = client_for("http://127.0.0.1:1", Some("test-key"));
        assert!(client.transcribe(Bytes::from_static(b"RIFF")).await.is_none());
    }
}
