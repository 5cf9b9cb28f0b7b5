//! Speaker verification gate.
//!
//! Only the speaker who opened the conversation should be able to drive it.
//! The gate accepts everyone until a reference recording exists, then defers
//! to a [`SpeakerVerifier`] backend.

mod embedding;
mod gate;

pub use embedding::{cosine_similarity, EmbeddingVerifier, SpeakerEmbedder};
pub use gate::SpeakerGate;

/// Default similarity threshold for accepting a speaker.
pub const DEFAULT_THRESHOLD: f32 = 0.35;

#[derive(Debug, thiserror::Error)]
pub enum SpeakerError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, SpeakerError>;

/// Compares a candidate chunk against the reference recording.
#[async_trait::async_trait]
pub trait SpeakerVerifier: Send + Sync {
    async fn verify(&self, candidate: &[f32], reference: &[f32], threshold: f32) -> Result<bool>;
}
