/// Result of a finalize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalTranscript {
    pub text: String,
    /// Spoken language detected by the backend, if it reports one.
    pub language: Option<String>,
}

impl FinalTranscript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl From<String> for FinalTranscript {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Incremental (online) transcription over consecutive chunks.
///
/// Implementations keep a running cache across calls; the turn machine calls
/// [`reset_cache`](Self::reset_cache) once the utterance has been finalized.
#[async_trait::async_trait]
pub trait StreamingTranscriber: Send {
    /// Transcribe one chunk (16kHz mono) and return only the new text.
    async fn transcribe_chunk(&mut self, samples: &[f32]) -> crate::Result<String>;

    fn reset_cache(&mut self);

    /// Hint the spoken language detected by the finalize pass.
    fn set_language(&mut self, _language: &str) {}
}

/// Finalize (offline) transcription over a whole utterance.
#[async_trait::async_trait]
pub trait FinalTranscriber: Send {
    async fn transcribe(&mut self, samples: &[f32]) -> crate::Result<FinalTranscript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_transcript_builder() {
        let transcript = FinalTranscript::new("hola").with_language("es");
        assert_eq!(transcript.text, "hola");
        assert_eq!(transcript.language.as_deref(), Some("es"));
    }

    #[test]
    fn test_final_transcript_from_string() {
        let transcript: FinalTranscript = String::from("hello").into();
        assert_eq!(transcript, FinalTranscript::new("hello"));
    }
}
