//! Answer generation for the dialogue orchestrator.
//!
//! Provides the `AnswerGenerator` capability (a lazy token stream over the
//! conversation so far), the running conversation history, and an Ollama
//! backend.

mod history;
mod ollama;

pub use history::{ChatMessage, ConversationHistory, Role, DEFAULT_INSTRUCTION_SUFFIX};
pub use ollama::{OllamaGenerator, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};

use futures::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("answer backend unreachable: {0}")]
    Unavailable(String),
    #[error("answer backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed answer stream: {0}")]
    InvalidResponse(String),
    #[error("answer stream failed: {0}")]
    StreamFailed(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Streams the answer to the latest user message, one token at a time.
///
/// The returned stream is lazy: nothing is requested until it is first
/// polled, and dropping it abandons the request.
pub trait AnswerGenerator: Send + Sync {
    fn stream(&self, history: &[ChatMessage]) -> BoxStream<'static, Result<String>>;
}
