//! Offline keyword responder used when no completion endpoint is configured.

use async_trait::async_trait;

use crate::backend::CompletionBackend;
use crate::error::CompletionError;
use crate::request::CompletionRequest;

/// Answers a handful of small-talk phrases and echoes everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResponder;

impl CannedResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn reply(&self, message: &str) -> String {
        let lower = message.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |w: &str| words.contains(&w);

        if has_word("hello") || has_word("hi") {
            "Hello! I'm your AI assistant. How can I help you today?".to_string()
        } else if lower.contains("how are you") {
            "I'm doing great! Thanks for asking. How can I assist you?".to_string()
        } else if lower.contains("what can you do") {
            "I can help you with various tasks, answer questions, and convert voice messages. \
             Just let me know what you need!"
                .to_string()
        } else if lower.contains("thank you") || has_word("thanks") {
            "You're welcome! I'm happy to help.".to_string()
        } else if has_word("bye") || has_word("goodbye") {
            "Goodbye! Have a great day!".to_string()
        } else {
            format!(
                "I received your message: '{}'. This is a simple response. \
                 You can enhance this with more sophisticated logic.",
                message
            )
        }
    }
}

#[async_trait]
impl CompletionBackend for CannedResponder {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.reply(&request.user_message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        let r = CannedResponder::new();
        assert!(r.reply("Hello there").starts_with("Hello!"));
        assert!(r.reply("hi").starts_with("Hello!"));
    }

    #[test]
    fn test_hi_inside_word_does_not_greet() {
        let r = CannedResponder::new();
        assert!(r.reply("this thing").starts_with("I received your message"));
    }

    #[test]
    fn test_phrases() {
        let r = CannedResponder::new();
        assert!(r.reply("How are you?").starts_with("I'm doing great"));
        assert!(r.reply("what can you do").starts_with("I can help"));
        assert_eq!(r.reply("Thanks!"), "You're welcome! I'm happy to help.");
        assert_eq!(r.reply("Goodbye"), "Goodbye! Have a great day!");
    }

    #[test]
    fn test_fallback_echoes_message() {
        let r = CannedResponder::new();
        let reply = r.reply("Explain transformers");
        assert!(reply.contains("'Explain transformers'"));
    }

    #[tokio::test]
    async fn test_backend_uses_user_message() {
        let req = CompletionRequest::new("sys", "thank you").with_context("ignored");
        let text = CannedResponder.complete(&req).await.unwrap();
        assert_eq!(text, "You're welcome! I'm happy to help.");
    }
}
