use crate::{Result, VoiceActivityDetector};

/// Default RMS level above which a chunk counts as speech.
pub const DEFAULT_RMS_THRESHOLD: f32 = 0.02;

/// Threshold detector on root-mean-square energy.
///
/// Good enough for clean close-talk microphones and file replay; noisy rooms
/// want a model-based detector.
#[derive(Debug, Clone, Copy)]
pub struct EnergyVad {
    threshold: f32,
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_RMS_THRESHOLD)
    }
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.max(0.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = samples.iter().map(|s| s * s).sum();
        (sum / samples.len() as f32).sqrt()
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn detect(&mut self, samples: &[f32]) -> Result<bool> {
        let rms = Self::rms(samples);
        tracing::trace!(rms, threshold = self.threshold, "energy vad");
        Ok(rms > self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_not_speech() {
        let mut vad = EnergyVad::default();
        assert!(!vad.detect(&vec![0.0; 9600]).unwrap());
    }

    #[test]
    fn test_loud_chunk_is_speech() {
        let mut vad = EnergyVad::default();
        let tone: Vec<f32> = (0..9600).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        assert!(vad.detect(&tone).unwrap());
    }

    #[test]
    fn test_empty_chunk_has_zero_rms() {
        assert_eq!(EnergyVad::rms(&[]), 0.0);
    }

    #[test]
    fn test_negative_threshold_clamped() {
        assert_eq!(EnergyVad::new(-1.0).threshold(), 0.0);
    }

    #[test]
    fn test_boxed_detector_delegates() {
        let mut vad: Box<dyn VoiceActivityDetector> = Box::new(EnergyVad::new(0.1));
        assert!(vad.detect(&[0.5; 16]).unwrap());
        assert!(!vad.detect(&[0.01; 16]).unwrap());
    }
}
