use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::shortcode::ShortCode;
use crate::url::{DedupeHash, NormalizedUrl};
use async_trait::async_trait;
use std::time::Duration;

/// Everything the store needs to claim one candidate code.
#[derive(Debug, Clone)]
pub struct CodeCommit {
    /// The candidate code to claim.
    pub code: ShortCode,
    /// The URL the mapping will point to.
    pub long_url: NormalizedUrl,
    /// When set, a reverse pointer from this hash to `code` is written too.
    pub dedupe: Option<DedupeHash>,
    /// Expiry of both records. `None` means permanent.
    pub ttl: Option<Duration>,
}

/// Result of an atomic commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The mapping (and dedupe pointer, if requested) were written.
    Committed,
    /// The code is already taken. Nothing was written.
    Collision,
    /// The dedupe pointer already exists and points at this code.
    /// Another allocation for the same URL won; nothing was written.
    Deduplicated(ShortCode),
}

/// Counter value after an increment inside a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Count including the increment that produced it.
    pub count: u64,
    /// Seconds until the counter expires, when the store knows.
    pub ttl_seconds: Option<u64>,
}

/// A store that can claim a short code in one indivisible step.
///
/// Implementations must run the existence check and both writes of
/// [`try_commit_code`](AtomicStore::try_commit_code) without interleaving
/// from any other transaction on the same store.
#[async_trait]
pub trait AtomicStore: Send + Sync + 'static {
    /// Returns the code the dedupe index holds for `hash`, if any.
    async fn lookup_dedupe(&self, hash: &DedupeHash) -> Result<Option<ShortCode>>;

    /// Claims `commit.code` if unused.
    async fn try_commit_code(&self, commit: &CodeCommit) -> Result<CommitOutcome>;
}

/// A store holding self-expiring counters.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Key layout of the store. Counter keys are built from it.
    fn keyspace(&self) -> &Keyspace;

    /// Increments `key`, setting it to expire after `window` when this is the
    /// first increment. Both steps are atomic per key.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount>;
}

#[async_trait]
impl<S: AtomicStore> AtomicStore for std::sync::Arc<S> {
    async fn lookup_dedupe(&self, hash: &DedupeHash) -> Result<Option<ShortCode>> {
        S::lookup_dedupe(self, hash).await
    }

    async fn try_commit_code(&self, commit: &CodeCommit) -> Result<CommitOutcome> {
        S::try_commit_code(self, commit).await
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for std::sync::Arc<S> {
    fn keyspace(&self) -> &Keyspace {
        S::keyspace(self)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        S::incr_window(self, key, window).await
    }
}
