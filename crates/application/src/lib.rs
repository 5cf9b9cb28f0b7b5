//! Voice assistant wiring.
//!
//! Connects the ingestion queue, the turn machine and the dialogue
//! orchestrator, each running as its own tokio task.

mod assistant;
mod config;
mod orchestrator;

pub use assistant::{AssistantHandle, VoiceAssistant, VoiceAssistantBuilder};
pub use config::{AssistantConfig, AudioConfig, ConfigError, LlmConfig, SpeakerConfig, TtsConfig};
pub use orchestrator::{DialogueOrchestrator, DialogueTurn, TurnOutcome};

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("assistant task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
