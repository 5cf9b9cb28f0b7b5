//! Voice activity detection capability.
//!
//! The turn machine only asks one question per chunk: is anybody speaking?
//! Backends answer it behind [`VoiceActivityDetector`].

mod energy;
#[cfg(feature = "silero")]
mod silero;

pub use energy::EnergyVad;
#[cfg(feature = "silero")]
pub use silero::SileroVad;

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("session creation failed")]
    SessionCreationFailed,
    #[error("inference error: {0}")]
    InferenceError(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

/// Classifies one chunk of normalized 16kHz mono audio as speech or silence.
///
/// Detectors may keep state across chunks (smoothing, model context), so
/// `detect` takes `&mut self`. The chunk consumer is the only caller.
pub trait VoiceActivityDetector: Send {
    fn detect(&mut self, samples: &[f32]) -> Result<bool>;

    /// Forget any cross-chunk context.
    fn reset(&mut self) {}
}

impl<T: VoiceActivityDetector + ?Sized> VoiceActivityDetector for Box<T> {
    fn detect(&mut self, samples: &[f32]) -> Result<bool> {
        (**self).detect(samples)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
