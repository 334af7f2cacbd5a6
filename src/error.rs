//! Error types for podcompanion.

use thiserror::Error;

/// Library-level error type for podcompanion operations.
#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Affect classification failed: {0}")]
    Affect(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Episode {0} has no chunks to profile")]
    EmptyChunkSet(String),

    #[error("Affect labels disagree for episode {episode_id}: {details}")]
    LabelMismatch { episode_id: String, details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

impl CompanionError {
    /// Whether this error means the requested artifact simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CompanionError::NotFound(_))
    }
}

/// Result type alias for podcompanion operations.
pub type Result<T> = std::result::Result<T, CompanionError>;
