use crate::{Result, SpeakerError, SpeakerVerifier};

/// Turns a recording into a fixed-size voice embedding.
pub trait SpeakerEmbedder: Send + Sync {
    fn embed(&self, samples: &[f32]) -> Result<Vec<f32>>;
}

/// Cosine similarity of two equally sized vectors. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(SpeakerError::InvalidInput(format!(
            "embedding size mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Verifier that accepts a candidate whose embedding is close enough to the
/// reference embedding.
///
/// The reference embedding is recomputed per call; embedders that are
/// expensive should cache internally.
pub struct EmbeddingVerifier<E> {
    embedder: E,
}

impl<E: SpeakerEmbedder> EmbeddingVerifier<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

#[async_trait::async_trait]
impl<E: SpeakerEmbedder> SpeakerVerifier for EmbeddingVerifier<E> {
    async fn verify(&self, candidate: &[f32], reference: &[f32], threshold: f32) -> Result<bool> {
        let candidate = self.embedder.embed(candidate)?;
        let reference = self.embedder.embed(reference)?;
        let similarity = cosine_similarity(&candidate, &reference)?;
        tracing::trace!(similarity, threshold, "speaker similarity");
        Ok(similarity >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-bin "embedding": energy of the first and second half.
    struct HalfEnergy;

    impl SpeakerEmbedder for HalfEnergy {
        fn embed(&self, samples: &[f32]) -> Result<Vec<f32>> {
            let mid = samples.len() / 2;
            let energy = |s: &[f32]| s.iter().map(|x| x * x).sum::<f32>();
            Ok(vec![energy(&samples[..mid]), energy(&samples[mid..])])
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_size_mismatch() {
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[tokio::test]
    async fn test_embedding_verifier_threshold() {
        let verifier = EmbeddingVerifier::new(HalfEnergy);
        let reference = [0.5, 0.5, 0.0, 0.0];
        let same = [0.4, 0.4, 0.0, 0.0];
        let other = [0.0, 0.0, 0.5, 0.5];

        assert!(verifier.verify(&same, &reference, 0.9).await.unwrap());
        assert!(!verifier.verify(&other, &reference, 0.35).await.unwrap());
    }
}
