use parley_stt::wav::encode_wav_pcm16;
use parley_stt::{FinalTranscriber, FinalTranscript, StreamingTranscriber, STT_SAMPLE_RATE};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{check_status, OpenAiConfig, OpenAiError, Result};

/// Whisper-style transcription over `/audio/transcriptions`.
///
/// Usable for both passes. The incremental pass has no server-side cache,
/// so each chunk is transcribed on its own.
#[derive(Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    config: OpenAiConfig,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl OpenAiTranscriber {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self {
            client,
            config,
            language: None,
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    async fn request(&self, samples: &[f32], response_format: &str) -> Result<TranscriptionResponse> {
        let wav = encode_wav_pcm16(samples, STT_SAMPLE_RATE)
            .map_err(|e| OpenAiError::Encode(e.to_string()))?;
        let audio = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", audio)
            .text("model", self.config.transcription_model.clone())
            .text("response_format", response_format.to_string())
            .text("temperature", "0");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        tracing::trace!(samples = samples.len(), response_format, "Sending transcription request");
        let response = self
            .client
            .post(self.config.endpoint("audio/transcriptions"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json::<TranscriptionResponse>()
            .await
            .map_err(|e| OpenAiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl StreamingTranscriber for OpenAiTranscriber {
    async fn transcribe_chunk(&mut self, samples: &[f32]) -> parley_stt::Result<String> {
        let response = self.request(samples, "json").await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{text} "))
    }

    fn reset_cache(&mut self) {}

    fn set_language(&mut self, language: &str) {
        self.language = language_code(language);
    }
}

#[async_trait::async_trait]
impl FinalTranscriber for OpenAiTranscriber {
    async fn transcribe(&mut self, samples: &[f32]) -> parley_stt::Result<FinalTranscript> {
        let response = self.request(samples, "verbose_json").await?;
        let mut transcript = FinalTranscript::new(response.text.trim());
        if let Some(code) = response.language.as_deref().and_then(language_code) {
            transcript = transcript.with_language(code);
        }
        Ok(transcript)
    }
}

/// `verbose_json` reports language names; the request field wants ISO 639-1.
fn language_code(language: &str) -> Option<String> {
    let language = language.trim().to_lowercase();
    if language.len() == 2 {
        return Some(language);
    }
    let code = match language.as_str() {
        "english" => "en",
        "spanish" => "es",
        "catalan" => "ca",
        "french" => "fr",
        "german" => "de",
        "italian" => "it",
        "portuguese" => "pt",
        "dutch" => "nl",
        "chinese" => "zh",
        "japanese" => "ja",
        "korean" => "ko",
        _ => return None,
    };
    Some(code.to_string())
}
