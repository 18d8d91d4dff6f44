use shortlink_core::{CoreError, StoreError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AllocError {
    /// Every candidate collided with an existing code.
    #[error("no free short code after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("rate limit exceeded, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CoreError),
    /// The store failed or timed out. The commit may or may not have happened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
