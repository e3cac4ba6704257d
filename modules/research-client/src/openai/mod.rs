mod client;
pub(crate) mod types;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ResearchError;
use crate::traits::{Message, ResearchAgent};
use crate::util::{strip_code_fence, truncate_to_char_boundary};
use client::ChatClient;
use types::{ChatRequest, WireMessage};

// =============================================================================
// OpenAI-compatible research agent
// =============================================================================

/// Research agent speaking the OpenAI chat-completions dialect.
///
/// Both backends expose this wire format; they differ in base URL, model and
/// whether live search parameters are attached.
#[derive(Clone)]
pub struct ChatResearcher {
    provider: String,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    search_parameters: Option<serde_json::Value>,
}

impl ChatResearcher {
    pub fn new(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            max_tokens: None,
            temperature: None,
            search_parameters: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_search_parameters(mut self, params: serde_json::Value) -> Self {
        self.search_parameters = Some(params);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, messages: Vec<Message>) -> ChatRequest {
        let mut request = ChatRequest::new(&self.model)
            .messages(messages.into_iter().map(WireMessage::from))
            .search_parameters(self.search_parameters.clone());
        if let Some(max_tokens) = self.max_tokens {
            request = request.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl ResearchAgent for ChatResearcher {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn research(&self, messages: Vec<Message>) -> Result<String> {
        let client = ChatClient::new(&self.api_key, &self.base_url)?;
        let request = self.request(messages);

        info!(provider = %self.provider, model = %self.model, "Sending research prompt");
        let response = client.chat(&request).await?;

        if let Some(usage) = &response.usage {
            info!(
                provider = %self.provider,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                sources = response.citations.len(),
                "Research response received"
            );
        }

        let text = response
            .text()
            .ok_or_else(|| ResearchError::EmptyResponse(self.provider.clone()))?;
        debug!(
            provider = %self.provider,
            preview = truncate_to_char_boundary(&text, 200),
            "Research response preview"
        );

        Ok(strip_code_fence(&text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_researcher_new() {
        let ai = ChatResearcher::new("perplexity", "pplx-test", "sonar-deep-research", "https://api.perplexity.ai");
        assert_eq!(ai.model(), "sonar-deep-research");
        assert_eq!(ai.provider(), "perplexity");
        assert_eq!(ai.api_key, "pplx-test");
    }

    #[test]
    fn request_carries_search_parameters() {
        let ai = ChatResearcher::new("xai", "xai-test", "grok-4", "https://api.x.ai/v1")
            .with_search_parameters(serde_json::json!({ "mode": "on" }))
            .with_max_tokens(8000);
        let request = ai.request(vec![Message::system("sys"), Message::user("prompt")]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.max_tokens, Some(8000));
        assert_eq!(
            request.search_parameters.as_ref().and_then(|p| p.get("mode")),
            Some(&serde_json::json!("on"))
        );
    }

    #[test]
    fn unreachable_endpoint_is_an_error() {
        let ai = ChatResearcher::new("local", "key", "model", "http://127.0.0.1:9");
        let result = tokio_test::block_on(ai.research(vec![Message::user("hi")]));
        assert!(result.is_err());
    }
}
