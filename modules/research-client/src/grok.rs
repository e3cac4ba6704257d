use serde_json::json;

use crate::openai::ChatResearcher;

pub const XAI_API_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_SOCIAL_SEARCH_MODEL: &str = "grok-4";

/// Live search over X and the open web, capped to the past week.
fn weekly_search_parameters(max_results: u32) -> serde_json::Value {
    json!({
        "mode": "on",
        "return_citations": true,
        "max_search_results": max_results,
        "sources": [
            { "type": "x" },
            { "type": "web" },
            { "type": "news" }
        ]
    })
}

/// Social deep-search backend.
pub fn social_search(api_key: &str, model: &str, base_url: Option<&str>) -> ChatResearcher {
    ChatResearcher::new("xai", api_key, model, base_url.unwrap_or(XAI_API_URL))
        .with_max_tokens(16_000)
        .with_temperature(0.2)
        .with_search_parameters(weekly_search_parameters(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searches_x_and_web() {
        let params = weekly_search_parameters(30);
        let sources = params["sources"].as_array().unwrap();
        assert!(sources.iter().any(|s| s["type"] == "x"));
        assert!(sources.iter().any(|s| s["type"] == "web"));
        assert_eq!(params["max_search_results"], 30);
    }

    #[test]
    fn custom_base_url_is_kept() {
        let ai = social_search("xai-test", DEFAULT_SOCIAL_SEARCH_MODEL, Some("http://localhost:8080/v1"));
        assert_eq!(ai.base_url(), "http://localhost:8080/v1");
    }
}
