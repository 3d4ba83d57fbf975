//! Errors surfaced by the key-value driver.

use thiserror::Error;

/// Failure modes of the key-value store surface.
#[derive(Debug, Error)]
pub enum KvError {
    /// The key-value store is unreachable or returned a transport-level error.
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),

    /// A command was issued with an empty key or value, which the reference
    /// driver treats as a programming error rather than silently no-opping
    /// (matches `third_party/redis.go`'s explicit empty-string guards).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        KvError::Unavailable(err.to_string())
    }
}
