// Error taxonomy for the indexing and search pipeline.
//
// Library code returns `Result<T, IndexError>`; per-file sweep failures are
// captured into `SweepStats.errors` instead of aborting the sweep.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Filesystem or network failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// AST extraction failed for a file.
    #[error("parse failure: {0}")]
    Parse(String),

    /// Database transaction or schema failure.
    #[error("store failure: {0}")]
    Store(String),

    /// The remote embedding service failed or rejected a batch.
    #[error("embedding failure: {0}")]
    Embedding(String),

    /// Invalid configuration (bad globs, unresolvable paths, missing env).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A query exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,
}

impl IndexError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable kind tag used in sweep error entries and the operation log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::Store(_) => "store",
            Self::Embedding(_) => "embedding",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("serialization: {e}"))
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(e: reqwest::Error) -> Self {
        Self::Embedding(e.to_string())
    }
}

impl From<globset::Error> for IndexError {
    fn from(e: globset::Error) -> Self {
        Self::Config(format!("glob pattern: {e}"))
    }
}
