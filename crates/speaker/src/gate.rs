use std::sync::Arc;

use crate::{Result, SpeakerVerifier, DEFAULT_THRESHOLD};

/// Sticky first-speaker filter.
///
/// The reference can be set exactly once; later attempts are ignored.
pub struct SpeakerGate {
    verifier: Option<Arc<dyn SpeakerVerifier>>,
    reference: Option<Arc<[f32]>>,
    threshold: f32,
}

impl Default for SpeakerGate {
    fn default() -> Self {
        Self::disabled()
    }
}

impl SpeakerGate {
    pub fn new(verifier: Arc<dyn SpeakerVerifier>, threshold: f32) -> Self {
        Self {
            verifier: Some(verifier),
            reference: None,
            threshold,
        }
    }

    /// A gate that lets every chunk through and never stores a reference.
    pub fn disabled() -> Self {
        Self {
            verifier: None,
            reference: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reference(&self) -> Option<&[f32]> {
        self.reference.as_deref()
    }

    /// True when the chunk may count as the user's speech.
    pub async fn verify(&self, samples: &[f32]) -> Result<bool> {
        let (Some(verifier), Some(reference)) = (&self.verifier, &self.reference) else {
            return Ok(true);
        };
        verifier.verify(samples, reference, self.threshold).await
    }

    /// Store `samples` as the permanent reference if none is stored yet.
    ///
    /// Returns true if this call set the reference. A disabled gate never
    /// stores anything.
    pub fn set_initial_reference(&mut self, samples: impl Into<Arc<[f32]>>) -> bool {
        if self.verifier.is_none() || self.reference.is_some() {
            return false;
        }
        let samples = samples.into();
        tracing::info!(samples = samples.len(), "Speaker reference captured");
        self.reference = Some(samples);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpeakerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts a candidate when its first sample matches the reference's.
    #[derive(Default)]
    struct FirstSampleVerifier {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SpeakerVerifier for FirstSampleVerifier {
        async fn verify(&self, candidate: &[f32], reference: &[f32], _threshold: f32) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(candidate.first() == reference.first())
        }
    }

    struct FailingVerifier;

    #[async_trait::async_trait]
    impl SpeakerVerifier for FailingVerifier {
        async fn verify(&self, _candidate: &[f32], _reference: &[f32], _threshold: f32) -> Result<bool> {
            Err(SpeakerError::VerificationFailed("backend down".into()))
        }
    }

    #[tokio::test]
    async fn test_accepts_everyone_before_reference() {
        let verifier = Arc::new(FirstSampleVerifier::default());
        let gate = SpeakerGate::new(verifier.clone(), 0.5);

        assert!(gate.verify(&[0.9, 0.1]).await.unwrap());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_reference_wins() {
        let mut gate = SpeakerGate::new(Arc::new(FirstSampleVerifier::default()), 0.5);

        assert!(gate.set_initial_reference(vec![0.1, 0.2]));
        assert!(!gate.set_initial_reference(vec![0.7, 0.8]));
        assert_eq!(gate.reference(), Some(&[0.1, 0.2][..]));

        assert!(gate.verify(&[0.1, 0.0]).await.unwrap());
        assert!(!gate.verify(&[0.7, 0.0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_gate_never_stores_reference() {
        let mut gate = SpeakerGate::disabled();
        assert!(!gate.set_initial_reference(vec![0.1]));
        assert!(gate.reference().is_none());
        assert!(gate.verify(&[0.3]).await.unwrap());
    }

    #[tokio::test]
    async fn test_verifier_error_propagates() {
        let mut gate = SpeakerGate::new(Arc::new(FailingVerifier), 0.5);
        // No reference yet: backend is not consulted
        assert!(gate.verify(&[0.1]).await.unwrap());

        gate.set_initial_reference(vec![0.1]);
        assert!(gate.verify(&[0.1]).await.is_err());
    }
}
