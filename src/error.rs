use thiserror::Error;

/// Faults raised by a storage backend. Adapters wrap their native error
/// types here; the engine surfaces them unchanged and never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

/// Engine-level error taxonomy. Errors bubble to the API boundary unchanged;
/// the ranked and boolean evaluators never emit a partial result list.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed boolean query, with the character offset of the offending
    /// token. Never retried.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Document or term absent on an explicit point lookup. Queries treat
    /// absence as an empty result instead.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// Incompatible analyzer toggles, unsupported backend, or a missing
    /// backend parameter at open time.
    #[error("config error: {0}")]
    Config(String),

    /// Internal consistency check failed; the index must be considered
    /// corrupt.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("query cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        EngineError::Parse {
            position,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
