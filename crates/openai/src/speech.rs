use futures::stream::BoxStream;
use futures::StreamExt;
use parley_bus::normalize_pcm16_le_bytes;
use parley_tts::{AudioFrame, SpeechSynthesizer, TtsError};

use crate::{check_status, OpenAiConfig, OpenAiError, Result};

/// `response_format = "pcm"` is 24kHz mono signed 16-bit little-endian.
pub const SPEECH_SAMPLE_RATE: u32 = 24000;

/// 100 ms frames.
pub const SPEECH_FRAME_SAMPLES: usize = 2400;

/// Speech synthesis over `/audio/speech`, streamed as the body arrives.
#[derive(Clone)]
pub struct OpenAiSpeech {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiSpeech {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }
}

impl SpeechSynthesizer for OpenAiSpeech {
    fn synthesize(&self, text: &str) -> BoxStream<'static, parley_tts::Result<AudioFrame>> {
        let request = self
            .client
            .post(self.config.endpoint("audio/speech"))
            .json(&serde_json::json!({
                "model": self.config.speech_model,
                "input": text,
                "voice": self.config.voice,
                "response_format": "pcm",
            }));
        tracing::debug!(chars = text.len(), voice = %self.config.voice, "Requesting speech");

        Box::pin(async_stream::try_stream! {
            let response = request.send().await.map_err(http_error)?;
            let response = check_status(response).await.map_err(TtsError::from)?;

            let mut body = response.bytes_stream();
            let mut framer = PcmFramer::new(SPEECH_FRAME_SAMPLES);
            while let Some(bytes) = body.next().await {
                let bytes = bytes.map_err(http_error)?;
                for samples in framer.push(&bytes) {
                    yield AudioFrame::new(samples, SPEECH_SAMPLE_RATE);
                }
            }
            if let Some(samples) = framer.finish() {
                yield AudioFrame::new(samples, SPEECH_SAMPLE_RATE);
            }
        })
    }
}

fn http_error(e: reqwest::Error) -> TtsError {
    OpenAiError::from(e).into()
}

/// Cuts a PCM16 byte stream into fixed-size normalized frames.
struct PcmFramer {
    frame_bytes: usize,
    pending: Vec<u8>,
}

impl PcmFramer {
    fn new(frame_samples: usize) -> Self {
        Self {
            frame_bytes: frame_samples.max(1) * 2,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_bytes {
            let frame: Vec<u8> = self.pending.drain(..self.frame_bytes).collect();
            frames.push(normalize_pcm16_le_bytes(&frame));
        }
        frames
    }

    /// The short last frame, if at least one whole sample is left.
    fn finish(&mut self) -> Option<Vec<f32>> {
        let rest = std::mem::take(&mut self.pending);
        let samples = normalize_pcm16_le_bytes(&rest);
        (!samples.is_empty()).then_some(samples)
    }
}
