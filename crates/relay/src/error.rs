//! Error types for the report relay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No active suite")]
    NoActiveSuite,

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Attachment error: {name} - {reason}")]
    Attachment { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
