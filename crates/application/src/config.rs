use std::path::{Path, PathBuf};

use parley_bus::{samples_per_chunk, AudioBusConfig};
use parley_llm::DEFAULT_INSTRUCTION_SUFFIX;
use parley_turn::TurnConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_duration_ms: u32,
    /// How much audio the ingestion queue holds before dropping chunks.
    pub bus_capacity_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: parley_bus::SAMPLE_RATE,
            chunk_duration_ms: parley_bus::CHUNK_DURATION_MS,
            bus_capacity_ms: parley_bus::DEFAULT_BUFFER_CAPACITY_MS,
        }
    }
}

impl AudioConfig {
    pub fn chunk_samples(&self) -> usize {
        samples_per_chunk(self.sample_rate, self.chunk_duration_ms)
    }

    pub fn bus_config(&self) -> AudioBusConfig {
        AudioBusConfig {
            capacity_ms: self.bus_capacity_ms,
            chunk_size_ms: self.chunk_duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    pub enabled: bool,
    pub threshold: f32,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: parley_speaker::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub buffer_threshold: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: parley_tts::DEFAULT_BUFFER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub instruction_suffix: String,
    /// Zero keeps the whole conversation.
    pub max_history_messages: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            instruction_suffix: DEFAULT_INSTRUCTION_SUFFIX.to_string(),
            max_history_messages: 0,
        }
    }
}

/// Everything tunable about one assistant instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub audio: AudioConfig,
    pub turn: TurnConfig,
    pub speaker: SpeakerConfig,
    pub tts: TtsConfig,
    pub llm: LlmConfig,
}

impl AssistantConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::Invalid("audio.sample_rate must be positive".into()));
        }
        if self.audio.chunk_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "audio.chunk_duration_ms must be positive".into(),
            ));
        }
        self.turn
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(0.0..=1.0).contains(&self.speaker.threshold) {
            return Err(ConfigError::Invalid(format!(
                "speaker.threshold must be within [0, 1], got {}",
                self.speaker.threshold
            )));
        }
        if self.tts.buffer_threshold == 0 {
            return Err(ConfigError::Invalid(
                "tts.buffer_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
