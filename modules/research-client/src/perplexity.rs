use crate::openai::ChatResearcher;

pub const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_DEEP_RESEARCH_MODEL: &str = "sonar-deep-research";

/// Deep-research text backend.
pub fn deep_research(api_key: &str, model: &str, base_url: Option<&str>) -> ChatResearcher {
    ChatResearcher::new(
        "perplexity",
        api_key,
        model,
        base_url.unwrap_or(PERPLEXITY_API_URL),
    )
    .with_max_tokens(16_000)
    .with_temperature(0.2)
}
