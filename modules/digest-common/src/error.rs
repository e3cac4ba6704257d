use thiserror::Error;

use crate::types::BackendId;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("No credential configured for {backend}")]
    MissingCredential { backend: BackendId },

    #[error("{backend} returned no usable topics ({rejected} malformed blocks)")]
    EmptyOrMalformedResponse { backend: BackendId, rejected: usize },

    #[error("{backend} request failed: {message}")]
    Backend { backend: BackendId, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Neither backend produced a fresh response")]
    NoFreshContent,

    #[error("No topic survived citation verification")]
    NoSurvivingTopics,

    #[error("Configuration error: {0}")]
    Config(String),
}
