use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;

use crate::{AnswerGenerator, ChatMessage, LlmError, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Streams chat completions from a local Ollama server (`/api/chat`).
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OllamaGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL)
    }
}

impl AnswerGenerator for OllamaGenerator {
    fn stream(&self, history: &[ChatMessage]) -> BoxStream<'static, Result<String>> {
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": history,
            "stream": true,
        });
        tracing::debug!(model = %self.model, messages = history.len(), "Requesting answer stream");

        Box::pin(async_stream::try_stream! {
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Unavailable(format!("Ollama not reachable: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                Err::<(), _>(LlmError::Api { status: status.as_u16(), message })?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut done = false;
            while !done {
                let Some(chunk) = bytes.next().await else {
                    break;
                };
                let chunk = chunk.map_err(|e| LlmError::StreamFailed(e.to_string()))?;
                for line in lines.push(&chunk) {
                    match parse_line(&line)? {
                        Some(StreamLine::Token(token)) => yield token,
                        Some(StreamLine::Done) => {
                            done = true;
                            break;
                        }
                        None => {}
                    }
                }
            }
            if !done {
                if let Some(line) = lines.finish() {
                    if let Some(StreamLine::Token(token)) = parse_line(&line)? {
                        yield token;
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Token(String),
    Done,
}

/// Ollama streams one JSON object per line.
fn parse_line(line: &str) -> Result<Option<StreamLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::StreamFailed(error));
    }
    if chunk.done {
        return Ok(Some(StreamLine::Done));
    }
    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty())
        .map(StreamLine::Token))
}

/// Reassembles lines split across HTTP body chunks.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
