/// Secrets and environment-specific values loaded from the environment.
/// Tunables (topic count, trust list, storage paths) live in the TOML `FileConfig`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    // Research backends. A missing key fails only that backend's branch.
    pub perplexity_api_key: Option<String>,
    pub xai_api_key: Option<String>,

    // Primary storage. File storage is used when unset.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            perplexity_api_key: optional_env("PERPLEXITY_API_KEY"),
            xai_api_key: optional_env("XAI_API_KEY"),
            database_url: optional_env("DATABASE_URL"),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  PERPLEXITY_API_KEY: {}", preview_opt(&self.perplexity_api_key));
        tracing::info!("  XAI_API_KEY: {}", preview_opt(&self.xai_api_key));
        tracing::info!(
            "  DATABASE_URL: {}",
            if self.database_url.is_some() { "<set>" } else { "<not set>" }
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn preview(val: &str) -> String {
    let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.chars().count())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) => preview(v),
        None => "<not set>".to_string(),
    }
}
