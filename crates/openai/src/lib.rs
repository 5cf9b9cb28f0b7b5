//! OpenAI-compatible HTTP backends for transcription and speech synthesis.
//!
//! Works against api.openai.com and self-hosted servers exposing the same
//! `/audio/transcriptions` and `/audio/speech` routes.

mod speech;
mod transcription;

pub use speech::{OpenAiSpeech, SPEECH_FRAME_SAMPLES, SPEECH_SAMPLE_RATE};
pub use transcription::OpenAiTranscriber;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to encode audio: {0}")]
    Encode(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, OpenAiError>;

impl From<OpenAiError> for parley_stt::SttError {
    fn from(e: OpenAiError) -> Self {
        parley_stt::SttError::TranscriptionFailed(e.to_string())
    }
}

impl From<OpenAiError> for parley_tts::TtsError {
    fn from(e: OpenAiError) -> Self {
        parley_tts::TtsError::SynthesisFailed(e.to_string())
    }
}

/// Endpoint, credentials and model names shared by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OpenAiConfig {
    pub(crate) fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), route)
    }

    /// HTTP client carrying the bearer token, if any.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| OpenAiError::InvalidConfig(format!("invalid API key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?)
    }
}

/// Turn a non-success response into [`OpenAiError::Api`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error response".to_string());
    Err(OpenAiError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = OpenAiConfig {
            base_url: "http://localhost:8000/v1/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint("audio/speech"),
            "http://localhost:8000/v1/audio/speech"
        );
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = OpenAiConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_build_client_rejects_bad_key() {
        let config = OpenAiConfig {
            api_key: Some("bad\nkey".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.build_client(),
            Err(OpenAiError::InvalidConfig(_))
        ));
        assert!(OpenAiConfig::default().build_client().is_ok());
    }

    #[test]
    fn test_errors_convert_to_capability_errors() {
        let err = OpenAiError::InvalidResponse("empty".into());
        let stt: parley_stt::SttError = err.into();
        assert!(stt.to_string().contains("empty"));
    }
}
