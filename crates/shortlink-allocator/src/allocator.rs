use crate::error::AllocError;
use shortlink_codegen::CandidateSource;
use shortlink_core::{AtomicStore, CodeCommit, CodeLength, CommitOutcome, NormalizedUrl, ShortCode};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_RETRIES: u32 = 7;

/// Per-call allocation settings.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct AllocateOptions {
    /// Length of the returned code.
    #[builder(default)]
    pub code_length: CodeLength,

    /// Retries after the first attempt; `max_retries + 1` candidates are tried.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Lifetime of the mapping and its dedupe pointer. Zero is permanent.
    #[builder(default = Duration::ZERO)]
    pub ttl: Duration,

    /// Reuse the code of an earlier allocation for the same URL.
    #[builder(default = true)]
    pub dedupe: bool,
}

impl Default for AllocateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AllocateOptions {
    /// Builds options from raw configuration values.
    pub fn from_raw(code_length: usize, max_retries: u32, ttl_millis: u64) -> Result<Self, AllocError> {
        let code_length =
            CodeLength::new(code_length).map_err(|e| AllocError::InvalidOptions(e.to_string()))?;
        Ok(Self::builder()
            .code_length(code_length)
            .max_retries(max_retries)
            .ttl(Duration::from_millis(ttl_millis))
            .build())
    }

    fn expiry(&self) -> Option<Duration> {
        (!self.ttl.is_zero()).then_some(self.ttl)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Allocates short codes against an [`AtomicStore`].
///
/// Holds no state of its own; uniqueness is entirely the store's commit
/// guarantee, so one allocator can serve any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct Allocator<S, G> {
    store: S,
    candidates: G,
}

impl<S: AtomicStore, G: CandidateSource> Allocator<S, G> {
    pub fn new(store: S, candidates: G) -> Self {
        Self { store, candidates }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the code for `url`, committing a new one if needed.
    ///
    /// With dedupe enabled, a live earlier allocation for the same URL is
    /// returned without any write. Otherwise candidates are tried in order
    /// until one commits; a store error ends the call immediately since the
    /// outcome of the failed commit is unknown.
    pub async fn allocate(
        &self,
        url: &NormalizedUrl,
        options: &AllocateOptions,
    ) -> Result<ShortCode, AllocError> {
        let dedupe = if options.dedupe {
            let hash = url.dedupe_hash();
            if let Some(code) = self.store.lookup_dedupe(&hash).await? {
                debug!(code = %code, url = %url, "Reusing existing short code");
                return Ok(code);
            }
            Some(hash)
        } else {
            None
        };

        let ttl = options.expiry();
        for attempt in 0..options.attempts() {
            let commit = CodeCommit {
                code: self
                    .candidates
                    .candidate_code(url, attempt, options.code_length),
                long_url: url.clone(),
                dedupe: dedupe.clone(),
                ttl,
            };
            trace!(code = %commit.code, attempt, "Trying candidate code");

            match self.store.try_commit_code(&commit).await? {
                CommitOutcome::Committed => {
                    info!(code = %commit.code, attempt, "Allocated short code");
                    return Ok(commit.code);
                }
                CommitOutcome::Collision => {
                    debug!(code = %commit.code, attempt, "Candidate code already taken");
                }
                CommitOutcome::Deduplicated(code) => {
                    debug!(code = %code, attempt, "Concurrent allocation for the same URL won");
                    return Ok(code);
                }
            }
        }

        let attempts = options.attempts();
        warn!(url = %url, attempts, "Exhausted candidate codes");
        Err(AllocError::Exhausted { attempts })
    }
}
