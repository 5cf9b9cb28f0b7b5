use serde::{Deserialize, Serialize};

/// Appended to every user message before it reaches the model.
pub const DEFAULT_INSTRUCTION_SUFFIX: &str =
    " Only answer in English and do not use Markdown. Use normal punctuation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Running user/assistant exchange, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    instruction_suffix: String,
    /// Zero keeps everything.
    max_messages: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION_SUFFIX, 0)
    }
}

impl ConversationHistory {
    pub fn new(instruction_suffix: impl Into<String>, max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            instruction_suffix: instruction_suffix.into(),
            max_messages,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages
            .push(ChatMessage::user(format!("{text}{}", self.instruction_suffix)));
        self.trim();
    }

    /// Record the produced answer. Interrupted answers are kept as far as
    /// they got; an empty answer leaves no message.
    pub fn push_assistant(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.messages.push(ChatMessage::assistant(text));
        self.trim();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn trim(&mut self) {
        if self.max_messages == 0 || self.messages.len() <= self.max_messages {
            return;
        }
        let excess = self.messages.len() - self.max_messages;
        self.messages.drain(..excess);
        // Never open with an answer to a question that is gone.
        if self
            .messages
            .first()
            .is_some_and(|m| m.role == Role::Assistant)
        {
            self.messages.remove(0);
        }
    }
}
