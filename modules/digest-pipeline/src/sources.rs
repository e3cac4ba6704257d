//! Research prompts and the per-backend source client.

use std::sync::Arc;

use tracing::{info, warn};

use digest_common::file_config::BackendsConfig;
use digest_common::{AppConfig, BackendId, DigestError};
use research_client::{grok, perplexity, Message, ResearchAgent};

use crate::parser::{self, ParsedResponse};

const SYSTEM_PROMPT: &str = "You are the research desk of a weekly newsletter about artificial \
intelligence. You only report developments from the past seven days, you cite primary sources \
and reputable outlets, and you never invent URLs. Follow the requested output format exactly.";

const TOPIC_FORMAT: &str = "\
## Topic <n>: <headline>
**Summary:** <two or three sentences>
**Why Viral:** <why people are talking about it>
**Why Valuable:** <why it matters to practitioners>
**Insights:** <what to watch next>
**Citations:**
- [<source title>](<url>)";

const SOCIAL_FORMAT: &str = "\
**X Posts:**
- @<handle> (<verified|unverified>, <followers> followers): \"<post text>\" | likes: <n> | reposts: <n> | replies: <n> | quotes: <n> | <post url>
**Related Hashtags:** #<tag>, #<tag>";

const TRENDING_FORMAT: &str = "\
## Trending Hashtags
- #<tag> | posts: <n> | likes: <n> | reposts: <n> | replies: <n>";

/// Research prompt for one backend.
pub fn research_prompt(backend: BackendId, top_n: usize, period: &str) -> String {
    let (focus, format) = match backend {
        BackendId::BackendA => (
            "Survey news, research papers and lab announcements.",
            TOPIC_FORMAT.to_string(),
        ),
        BackendId::BackendB => (
            "Search X and the web for the AI stories with the most engagement, and include \
             the posts and hashtags that carried them.",
            format!("{TOPIC_FORMAT}\n{SOCIAL_FORMAT}"),
        ),
    };
    let trailer = match backend {
        BackendId::BackendA => String::new(),
        BackendId::BackendB => format!("\n\nEnd with:\n\n{TRENDING_FORMAT}"),
    };

    format!(
        "Identify the {top_n} most significant AI developments of week {period}. {focus}\n\n\
         Start with a level-one heading and a single lead paragraph summarising the week. \
         Then write one section per development, in this exact format:\n\n\
         {format}{trailer}\n\n\
         Each development needs at least two citations with full URLs. Do not wrap the answer \
         in a code block."
    )
}

/// Holds one research agent per backend; a missing agent means the backend
/// has no credential.
#[derive(Clone, Default)]
pub struct SourceClient {
    backend_a: Option<Arc<dyn ResearchAgent>>,
    backend_b: Option<Arc<dyn ResearchAgent>>,
}

impl SourceClient {
    pub fn new(
        backend_a: Option<Arc<dyn ResearchAgent>>,
        backend_b: Option<Arc<dyn ResearchAgent>>,
    ) -> Self {
        Self { backend_a, backend_b }
    }

    /// Build agents for every backend that has an API key.
    pub fn from_config(app: &AppConfig, backends: &BackendsConfig) -> Self {
        let backend_a = app.perplexity_api_key.as_deref().map(|key| {
            Arc::new(perplexity::deep_research(
                key,
                &backends.a_model,
                backends.a_base_url.as_deref(),
            )) as Arc<dyn ResearchAgent>
        });
        let backend_b = app.xai_api_key.as_deref().map(|key| {
            Arc::new(grok::social_search(
                key,
                &backends.b_model,
                backends.b_base_url.as_deref(),
            )) as Arc<dyn ResearchAgent>
        });
        Self::new(backend_a, backend_b)
    }

    fn agent(&self, backend: BackendId) -> Option<&Arc<dyn ResearchAgent>> {
        match backend {
            BackendId::BackendA => self.backend_a.as_ref(),
            BackendId::BackendB => self.backend_b.as_ref(),
        }
    }

    /// Raw research text from one backend.
    pub async fn fetch(
        &self,
        backend: BackendId,
        top_n: usize,
        period: &str,
    ) -> Result<String, DigestError> {
        let agent = self
            .agent(backend)
            .ok_or(DigestError::MissingCredential { backend })?;

        info!(%backend, provider = agent.provider(), model = agent.model(), "Requesting research");
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(research_prompt(backend, top_n, period)),
        ];
        agent
            .research(messages)
            .await
            .map_err(|e| DigestError::Backend {
                backend,
                message: e.to_string(),
            })
    }

    /// Fetch and parse. Zero parsed topics fails the branch.
    pub async fn fetch_parsed(
        &self,
        backend: BackendId,
        top_n: usize,
        period: &str,
    ) -> Result<ParsedResponse, DigestError> {
        let raw = self.fetch(backend, top_n, period).await?;
        let parsed = parser::parse(&raw, backend);

        for rejection in &parsed.rejected {
            warn!(%backend, error = %rejection, "Rejected malformed topic block");
        }
        if parsed.topics.is_empty() {
            return Err(DigestError::EmptyOrMalformedResponse {
                backend,
                rejected: parsed.rejected.len(),
            });
        }

        info!(
            %backend,
            topics = parsed.topics.len(),
            rejected = parsed.rejected.len(),
            posts = parsed.social.posts.len(),
            hashtags = parsed.social.hashtags.len(),
            "Parsed research response"
        );
        Ok(parsed)
    }
}
