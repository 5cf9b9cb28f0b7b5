//! Streaming speech output for the dialogue orchestrator.
//!
//! Answer text is buffered into utterance-sized units, synthesized one unit
//! at a time in submission order, and played through an [`AudioSink`].
//! Every stage watches the turn's [`InterruptSignal`].

mod buffer;
mod interrupt;
mod preprocess;
mod streamer;
mod synth;

pub use buffer::{TextBuffer, DEFAULT_BUFFER_THRESHOLD, FLUSH_CHARS};
pub use interrupt::InterruptSignal;
pub use preprocess::preprocess_for_speech;
pub use streamer::{SpeechHandle, SpeechOutcome, TtsStreamer};
pub use synth::{AudioFrame, AudioSink, NullSink, SpeechSynthesizer};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TtsError {
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("audio playback failed: {0}")]
    PlaybackFailed(String),
}

pub type Result<T> = std::result::Result<T, TtsError>;
