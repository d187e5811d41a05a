//! Completion request types.

use serde::{Deserialize, Serialize};

use sage_core::config::CompletionConfig;

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl From<&CompletionConfig> for CompletionOptions {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A previous exchange used as a conversation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// A role-tagged chat message as sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Everything needed for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Formatted knowledge block; empty when nothing matched.
    pub context_block: String,
    /// Prior exchanges, oldest first.
    pub conversation_hint: Vec<Turn>,
    pub user_message: String,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            context_block: String::new(),
            conversation_hint: Vec::new(),
            user_message: user_message.into(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_context(mut self, context_block: impl Into<String>) -> Self {
        self.context_block = context_block.into();
        self
    }

    pub fn with_hint(mut self, turns: Vec<Turn>) -> Self {
        self.conversation_hint = turns;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// The final user turn, with the knowledge block prepended when present.
    pub fn user_prompt(&self) -> String {
        if self.context_block.trim().is_empty() {
            format!("User question: {}", self.user_message)
        } else {
            format!(
                "Context from knowledge base:\n{}\n\nUser question: {}",
                self.context_block, self.user_message
            )
        }
    }

    /// System prompt, hint turns, then the user prompt.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + self.conversation_hint.len() * 2);
        messages.push(ChatMessage::new("system", self.system_prompt.clone()));
        for turn in &self.conversation_hint {
            messages.push(ChatMessage::new("user", turn.user.clone()));
            messages.push(ChatMessage::new("assistant", turn.assistant.clone()));
        }
        messages.push(ChatMessage::new("user", self.user_prompt()));
        messages
    }
}
