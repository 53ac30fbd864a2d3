//! Transcription endpoint configuration.

/// Production base URL of the speech-to-text API.
pub const STT_DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Transcription endpoint path, relative to the base URL.
pub const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// Default transcription model.
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Placeholder emitted to the client when transcription is unavailable or
/// fails. The audio itself has already been delivered; the text is a pure
/// enhancement.
pub const FALLBACK_TRANSCRIPT: &str = "[voice reply]";

/// Configuration for the transcription fallback.
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Bearer token; `None` disables transcription entirely.
    pub api_key: Option<String>,
    /// Transcription model name.
    pub model: String,
    /// REST base URL; overridable so tests can run against a local fake.
    pub base_url: String,
}

impl SttConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_STT_MODEL.to_string(),
            base_url: STT_DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Full transcription endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TRANSCRIPTIONS_PATH)
    }
}
