use std::time::Duration;

use silero::{VadConfig, VadSession, VadTransition};

use crate::{Result, VadError, VoiceActivityDetector};

/// Silero model wrapped as a per-chunk speech classifier.
///
/// Silero reports speech start/end transitions; a chunk counts as speech
/// while the session is inside a speech segment, including the chunk that
/// closes it.
pub struct SileroVad {
    session: VadSession,
    in_speech: bool,
}

impl SileroVad {
    pub fn new(sample_rate: u32) -> Result<Self> {
        let config = VadConfig {
            sample_rate: sample_rate as usize,
            // Silence before speech ends
            redemption_time: Duration::from_millis(300),
            pre_speech_pad: Duration::from_millis(100),
            post_speech_pad: Duration::from_millis(100),
            min_speech_time: Duration::from_millis(100),
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: VadConfig) -> Result<Self> {
        let session = VadSession::new(config).map_err(|_| VadError::SessionCreationFailed)?;
        Ok(Self {
            session,
            in_speech: false,
        })
    }
}

impl VoiceActivityDetector for SileroVad {
    fn detect(&mut self, samples: &[f32]) -> Result<bool> {
        let transitions = self
            .session
            .process(samples)
            .map_err(|e| VadError::InferenceError(e.to_string()))?;

        let mut heard = self.in_speech;
        for transition in transitions {
            match transition {
                VadTransition::SpeechStart { .. } => {
                    self.in_speech = true;
                    heard = true;
                }
                VadTransition::SpeechEnd { .. } => {
                    self.in_speech = false;
                    heard = true;
                    tracing::debug!("VAD detected speech end");
                }
            }
        }
        Ok(heard)
    }

    fn reset(&mut self) {
        self.session.reset();
        self.in_speech = false;
    }
}
