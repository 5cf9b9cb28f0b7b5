//! Turn-taking state machine.
//!
//! Converts the microphone chunk stream into discrete user turns:
//! IDLE → ONLINE (speech, incremental transcription) → OFFLINE (pause,
//! finalized transcription) → IDLE (silence long enough to yield the floor).

mod config;
mod listening;
mod machine;
mod transcript;

pub use config::TurnConfig;
pub use listening::{ListeningSnapshot, ListeningWatch};
pub use machine::{HysteresisCounters, TurnMachine, Utterance};
pub use parley_events::TurnState;
pub use transcript::Transcript;

/// Errors raised while processing a chunk or building the machine.
///
/// The first three variants are model inference failures: recoverable, the
/// chunk's effect is dropped and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("voice activity detection failed: {0}")]
    Vad(#[from] parley_vad::VadError),
    #[error("speaker verification failed: {0}")]
    Speaker(#[from] parley_speaker::SpeakerError),
    #[error("transcription failed: {0}")]
    Transcription(#[from] parley_stt::SttError),
    #[error("invalid turn configuration: {0}")]
    InvalidConfig(String),
}

impl TurnError {
    pub fn is_model_inference(&self) -> bool {
        !matches!(self, TurnError::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_failures_are_recoverable() {
        let vad = TurnError::from(parley_vad::VadError::InferenceError("frame".into()));
        let stt = TurnError::from(parley_stt::SttError::TranscriptionFailed("final".into()));
        assert!(vad.is_model_inference());
        assert!(stt.is_model_inference());
        assert!(!TurnError::InvalidConfig("ending".into()).is_model_inference());
    }
}
