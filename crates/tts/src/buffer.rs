/// Minimum buffered characters before a unit may be cut.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 50;

/// A unit is only cut after one of these.
pub const FLUSH_CHARS: &[char] = &[' ', ',', ':', ';', '.', '!', '?', '\n', '。'];

/// Append-only answer text, cut into synthesis units at natural breaks.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    threshold: usize,
}

impl TextBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            text: String::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append text and return a unit if the buffer is now long enough and
    /// ends at a break.
    pub fn push(&mut self, text: &str) -> Option<String> {
        self.text.push_str(text);
        let at_break = self.text.ends_with(FLUSH_CHARS);
        if self.text.chars().count() >= self.threshold && at_break {
            return Some(std::mem::take(&mut self.text));
        }
        None
    }

    /// Return whatever is buffered, regardless of length or punctuation.
    pub fn flush(&mut self) -> Option<String> {
        if self.text.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.text))
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_THRESHOLD)
    }
}
