/// Committed (finalized) plus pending (incremental) transcript text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    committed: String,
    pending: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Append incremental text for the utterance in progress.
    pub fn push_pending(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Append finalized text; it supersedes everything pending.
    pub fn commit(&mut self, text: &str) {
        self.committed.push_str(text);
        self.pending.clear();
    }

    /// The externally visible transcript.
    pub fn text(&self) -> String {
        format!("{}{}", self.committed, self.pending)
    }

    /// True when there is nothing worth answering.
    pub fn is_empty(&self) -> bool {
        self.committed.trim().is_empty() && self.pending.trim().is_empty()
    }

    pub fn reset(&mut self) {
        self.committed.clear();
        self.pending.clear();
    }

    /// Read and clear in one step. Returns `None` for a blank transcript,
    /// which is cleared as well.
    pub fn take(&mut self) -> Option<String> {
        let text = self.text().trim().to_string();
        self.reset();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_supersedes_pending() {
        let mut transcript = Transcript::new();
        transcript.push_pending("helo ");
        transcript.push_pending("wrld");
        assert_eq!(transcript.text(), "helo wrld");

        transcript.commit("Hello world.");
        assert_eq!(transcript.committed(), "Hello world.");
        assert_eq!(transcript.pending(), "");

        transcript.push_pending(" how");
        assert_eq!(transcript.text(), "Hello world. how");
    }

    #[test]
    fn test_reset_twice_is_empty_both_times() {
        let mut transcript = Transcript::new();
        transcript.commit("something");
        transcript.push_pending("more");

        transcript.reset();
        assert!(transcript.is_empty());
        assert_eq!(transcript.text(), "");

        transcript.reset();
        assert!(transcript.is_empty());
        assert_eq!(transcript.text(), "");
    }

    #[test]
    fn test_take_clears() {
        let mut transcript = Transcript::new();
        transcript.commit("  Hi there ");
        assert_eq!(transcript.take().as_deref(), Some("Hi there"));
        assert!(transcript.is_empty());
        assert_eq!(transcript.take(), None);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let mut transcript = Transcript::new();
        transcript.push_pending("  \n");
        assert!(transcript.is_empty());
        assert_eq!(transcript.take(), None);
        assert_eq!(transcript.pending(), "");
    }
}
