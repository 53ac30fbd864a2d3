//! Process configuration.
//!
//! Everything comes from environment variables (a `.env` file is honored
//! in development). Upstream and transcription credentials are optional at
//! startup: the server binds and serves regardless, and a session missing
//! upstream credentials is told so over its own socket.

use std::env;

use tracing::warn;

use crate::core::stt::SttConfig;
use crate::core::upstream::{UPSTREAM_DEFAULT_BASE_URL, UpstreamConfig};

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host (`BRIDGE_HOST`).
    pub host: String,
    /// Bind port (`BRIDGE_PORT`).
    pub port: u16,
    /// Upstream agent id (`AGENT_ID`).
    pub agent_id: Option<String>,
    /// Upstream provider API key (`ELEVENLABS_API_KEY`).
    pub upstream_api_key: Option<String>,
    /// Transcription API key (`OPENAI_API_KEY`); absence disables the
    /// transcription fallback, never the bridge.
    pub stt_api_key: Option<String>,
    /// Upstream REST base override (`UPSTREAM_BASE_URL`), for tests.
    pub upstream_base_url: String,
    /// Transcription REST base override (`STT_BASE_URL`), for tests.
    pub stt_base_url: Option<String>,
}

impl ServerConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let host = env::var("BRIDGE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var("BRIDGE_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("invalid BRIDGE_PORT {raw:?}, falling back to {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        Self {
            host,
            port,
            agent_id: non_empty_var("AGENT_ID"),
            upstream_api_key: non_empty_var("ELEVENLABS_API_KEY"),
            stt_api_key: non_empty_var("OPENAI_API_KEY"),
            upstream_base_url: non_empty_var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| UPSTREAM_DEFAULT_BASE_URL.to_string()),
            stt_base_url: non_empty_var("STT_BASE_URL"),
        }
    }

    /// Bind address for the listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upstream connection config, if both credentials are present.
    pub fn upstream_config(&self) -> Option<UpstreamConfig> {
        let agent_id = self.agent_id.as_deref()?;
        let api_key = self.upstream_api_key.as_deref()?;
        let mut config = UpstreamConfig::new(agent_id, api_key);
        config.base_url = self.upstream_base_url.clone();
        Some(config)
    }

    /// Transcription config. Always usable; a missing key makes
    /// transcription a no-op.
    pub fn stt_config(&self) -> SttConfig {
        let mut config = SttConfig::new(self.stt_api_key.clone());
        if let Some(base_url) = &self.stt_base_url {
            config.base_url = base_url.clone();
        }
        config
    }
}

/// Treat unset and empty the same way.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> ServerConfig {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            agent_id: None,
            upstream_api_key: None,
            stt_api_key: None,
            upstream_base_url: UPSTREAM_DEFAULT_BASE_URL.to_string(),
            stt_base_url: None,
        }
    }

    #[test]
    fn test_address_formatting() {
        let mut config = bare_config();
        config.host = "127.0.0.1".to_string();
        config.port = 9001;
        assert_eq!(config.address(), "127.0.0.1:9001");
    }

    #[test]
    fn test_upstream_config_requires_both_credentials() {
        let mut config = bare_config();
        assert!(config.upstream_config().is_none());

        config.agent_id = Some("agent_1".to_string());
        assert!(config.upstream_config().is_none());

        config.upstream_api_key = Some("key".to_string());
        let upstream = config.upstream_config().expect("both credentials set");
        assert_eq!(upstream.agent_id, "agent_1");
    }

    #[test]
    fn test_stt_config_without_key_disables_transcription() {
        let config = bare_config();
        assert!(config.stt_config().api_key.is_none());
    }
}
