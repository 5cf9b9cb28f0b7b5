//! Two-pass speech-to-text capabilities.
//!
//! An incremental transcriber produces cheap partial text chunk by chunk while
//! the user is still talking. A finalize transcriber later re-reads the whole
//! utterance and its result supersedes the partials.

mod transcriber;
pub mod wav;

pub use transcriber::{FinalTranscriber, FinalTranscript, StreamingTranscriber};

/// Standard sample rate for STT processing.
pub const STT_SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("invalid audio format")]
    InvalidAudioFormat,
}

pub type Result<T> = std::result::Result<T, SttError>;
