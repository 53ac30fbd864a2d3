//! Upstream provider configuration and endpoint constants.

/// Production REST base of the conversational-voice provider.
pub const UPSTREAM_DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

/// Path of the signed-URL endpoint, relative to the base URL.
pub const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get_signed_url";

/// Header carrying the long-lived provider API key. The key never reaches
/// the browser; the short-lived signed URL does the authentication on the
/// WebSocket side.
pub const API_KEY_HEADER: &str = "xi-api-key";

/// Configuration for one upstream connection attempt.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Provider agent to converse with.
    pub agent_id: String,
    /// Provider API key used for the signed-URL fetch.
    pub api_key: String,
    /// REST base URL; overridable so tests can run against a local fake.
    pub base_url: String,
}

impl UpstreamConfig {
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            api_key: api_key.into(),
            base_url: UPSTREAM_DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Full signed-URL endpoint including the agent id query parameter.
    pub fn signed_url_endpoint(&self) -> String {
        format!(
            "{}{}?agent_id={}",
            self.base_url, SIGNED_URL_PATH, self.agent_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_url_endpoint() {
        let config = UpstreamConfig::new("agent_42", "key");
        assert_eq!(
            config.signed_url_endpoint(),
            "https://api.elevenlabs.io/v1/convai/conversation/get_signed_url?agent_id=agent_42"
        );
    }

    #[test]
    fn test_base_url_override() {
        let mut config = UpstreamConfig::new("a", "k");
        config.base_url = "http://127.0.0.1:9999".to_string();
        assert!(
            config
                .signed_url_endpoint()
                .starts_with("http://127.0.0.1:9999/")
        );
    }
}
