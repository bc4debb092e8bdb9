//! Error types for Quarry CI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Lookup errors
    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // Configuration errors
    #[error("Invalid build configuration: {0}")]
    ConfigParse(String),

    #[error("Invalid trigger payload: {0}")]
    InvalidTrigger(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
