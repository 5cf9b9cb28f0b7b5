use serde::{Deserialize, Serialize};

use crate::{Result, TurnError};

/// Hysteresis thresholds, all counted in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Consecutive silent chunks after speech before the utterance is finalized.
    pub ending_threshold: u32,
    /// Consecutive silent chunks before the user yields the floor.
    pub idle_threshold: u32,
    /// Maximum chunks accumulated before a finalize pass is forced.
    pub accumulated_speech_threshold: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            ending_threshold: 2,
            idle_threshold: 8,
            accumulated_speech_threshold: 50,
        }
    }
}

impl TurnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ending_threshold == 0 {
            return Err(TurnError::InvalidConfig(
                "ending_threshold must be at least 1".into(),
            ));
        }
        if self.idle_threshold == 0 {
            return Err(TurnError::InvalidConfig(
                "idle_threshold must be at least 1".into(),
            ));
        }
        if self.accumulated_speech_threshold == 0 {
            return Err(TurnError::InvalidConfig(
                "accumulated_speech_threshold must be at least 1".into(),
            ));
        }
        // Both counters start together after the last speech chunk; a finalize
        // pass must fire before the idle transition hands the turn over.
        if self.ending_threshold >= self.idle_threshold {
            return Err(TurnError::InvalidConfig(format!(
                "ending_threshold ({}) must be below idle_threshold ({})",
                self.ending_threshold, self.idle_threshold
            )));
        }
        Ok(())
    }
}
