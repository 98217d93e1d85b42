pub mod groq;
pub mod ollama;
pub mod recognizer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use recognizer::{IntentRecognizer, LlmRecognizer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Chat-completion backend. Implementations return the assistant's raw
/// reply text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}
