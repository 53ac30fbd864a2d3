//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::stt::SttClient;

/// State shared by every bridge session: the process configuration and a
/// single pooled HTTP client reused for signed-URL fetches and
/// transcription calls.
pub struct AppState {
    pub config: ServerConfig,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    /// Transcription client for one session.
    pub fn stt_client(&self) -> SttClient {
        SttClient::new(self.http.clone(), self.config.stt_config())
    }
}
