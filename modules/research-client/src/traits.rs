use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// =============================================================================
// ResearchAgent Trait
// =============================================================================

/// A backend that answers one long research prompt with free-form markup.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    /// Short provider label used in logs.
    fn provider(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Send the conversation and return the raw response text.
    async fn research(&self, messages: Vec<Message>) -> Result<String>;
}
