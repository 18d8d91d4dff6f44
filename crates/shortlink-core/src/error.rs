use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("code length must be between {min} and {max}, got {got}")]
    InvalidCodeLength { got: usize, min: usize, max: usize },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid code secret: {0}")]
    InvalidSecret(String),
}

/// Errors surfaced by a key-value store backend.
///
/// None of these say anything about whether a write happened. Callers must
/// not read a `Timeout` as a collision or as a successful commit.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("store operation failed: {0}")]
    Operation(String),
}
