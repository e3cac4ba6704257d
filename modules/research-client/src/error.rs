use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ResearchError {
    fn from(err: reqwest::Error) -> Self {
        ResearchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ResearchError {
    fn from(err: serde_json::Error) -> Self {
        ResearchError::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ResearchError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        ResearchError::Config(err.to_string())
    }
}
