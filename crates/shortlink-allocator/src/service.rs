use crate::allocator::{AllocateOptions, Allocator};
use crate::error::AllocError;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use shortlink_codegen::CandidateSource;
use shortlink_core::{AtomicStore, Clock, CounterStore, NormalizedUrl, ShortCode, SystemClock};
use std::sync::Arc;
use tracing::info;
use typed_builder::TypedBuilder;

pub const DEFAULT_RESOLVE_PATH: &str = "/api";

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Prefix of returned short URLs, e.g. `https://sho.rt`.
    #[builder(setter(into))]
    pub base_url: String,
    /// Path the resolver is mounted under, placed between `base_url` and the
    /// code. Empty puts the code directly under `base_url`.
    #[builder(default = DEFAULT_RESOLVE_PATH.to_string(), setter(into))]
    pub resolve_path: String,
    #[builder(default)]
    pub allocate: AllocateOptions,
    #[builder(default)]
    pub rate_limit: RateLimitPolicy,
}

impl ServiceConfig {
    /// `base_url` joined with `resolve_path`, without a trailing slash.
    pub fn short_url_prefix(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.resolve_path.trim_matches('/') {
            "" => base.to_string(),
            path => format!("{base}/{path}"),
        }
    }
}

/// A newly created (or reused) short link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub code: ShortCode,
    pub short_url: String,
}

/// The create-short-link flow: admission, normalization, allocation.
pub struct ShortlinkService<S, G, C = SystemClock> {
    allocator: Allocator<Arc<S>, G>,
    limiter: RateLimiter<Arc<S>, C>,
    config: ServiceConfig,
}

impl<S, G> ShortlinkService<S, G, SystemClock>
where
    S: AtomicStore + CounterStore,
    G: CandidateSource,
{
    pub fn new(store: S, candidates: G, config: ServiceConfig) -> Self {
        Self::with_clock(store, candidates, config, SystemClock)
    }
}

impl<S, G, C> ShortlinkService<S, G, C>
where
    S: AtomicStore + CounterStore,
    G: CandidateSource,
    C: Clock,
{
    /// Builds a service whose allocator and rate limiter share `store`,
    /// and with it the store's key layout.
    pub fn with_clock(store: S, candidates: G, config: ServiceConfig, clock: C) -> Self {
        let store = Arc::new(store);
        Self {
            allocator: Allocator::new(store.clone(), candidates),
            limiter: RateLimiter::with_clock(store, clock),
            config,
        }
    }

    pub fn store(&self) -> &S {
        self.allocator.store()
    }

    /// Creates a short link for `raw_url` on behalf of `origin`.
    ///
    /// Over-limit callers are turned away before the URL is even parsed.
    pub async fn create(&self, origin: &str, raw_url: &str) -> Result<Created, AllocError> {
        self.limiter.admit(origin, &self.config.rate_limit).await?;

        let url = NormalizedUrl::parse(raw_url)?;
        let code = self.allocator.allocate(&url, &self.config.allocate).await?;
        let short_url = code.to_url(&self.config.short_url_prefix());

        info!(origin, code = %code, "Created short link");
        Ok(Created { code, short_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlink_codegen::{CodeSecret, HmacCandidates};
    use shortlink_core::{CoreError, Keyspace, ManualClock};
    use shortlink_store::InMemoryStore;

    type TestService =
        ShortlinkService<InMemoryStore<ManualClock>, HmacCandidates<ManualClock>, ManualClock>;

    const NOW: i64 = 1_700_000_000_000;

    fn service_in(keyspace: Keyspace, config: ServiceConfig) -> TestService {
        let clock = ManualClock::at_millis(NOW);
        let store = InMemoryStore::with_clock(keyspace, clock.clone());
        let candidates =
            HmacCandidates::with_clock(&CodeSecret::insecure_dev(), clock.clone()).unwrap();
        ShortlinkService::with_clock(store, candidates, config, clock)
    }

    fn test_service(config: ServiceConfig) -> TestService {
        service_in(Keyspace::default(), config)
    }

    fn config() -> ServiceConfig {
        ServiceConfig::builder().base_url("https://sho.rt/").build()
    }

    #[tokio::test]
    async fn create_returns_code_and_short_url() {
        let service = test_service(config());

        let created = service
            .create("10.0.0.1", "https://example.com/path")
            .await
            .unwrap();

        assert_eq!(created.code.as_str().len(), 7);
        assert_eq!(
            created.short_url,
            format!("https://sho.rt/api/{}", created.code)
        );
        assert_eq!(
            service.store().mapping(&created.code).as_deref(),
            Some("https://example.com/path")
        );
    }

    #[tokio::test]
    async fn empty_resolve_path_puts_code_under_base_url() {
        let service = test_service(
            ServiceConfig::builder()
                .base_url("https://sho.rt")
                .resolve_path("")
                .build(),
        );

        let created = service
            .create("10.0.0.1", "https://example.com/path")
            .await
            .unwrap();

        assert_eq!(created.short_url, format!("https://sho.rt/{}", created.code));
    }

    #[test]
    fn short_url_prefix_joins_base_and_path() {
        let prefix = |base: &str, path: &str| {
            ServiceConfig::builder()
                .base_url(base)
                .resolve_path(path)
                .build()
                .short_url_prefix()
        };

        assert_eq!(prefix("https://sho.rt", "/api"), "https://sho.rt/api");
        assert_eq!(prefix("https://sho.rt/", "/api/"), "https://sho.rt/api");
        assert_eq!(prefix("https://sho.rt", "r"), "https://sho.rt/r");
        assert_eq!(prefix("https://sho.rt/", "/"), "https://sho.rt");
    }

    #[tokio::test]
    async fn rate_counters_share_the_store_namespace() {
        let service = service_in(Keyspace::namespaced("tenant"), config());

        service
            .create("10.0.0.1", "https://example.com/path")
            .await
            .unwrap();

        let index = NOW / 60_000;
        let store = service.store();
        assert_eq!(
            store.get(&format!("tenant:rl:10.0.0.1:{index}")).as_deref(),
            Some("1")
        );
        assert!(store.get(&format!("rl:10.0.0.1:{index}")).is_none());
    }

    #[tokio::test]
    async fn repeated_create_reuses_code() {
        let service = test_service(config());

        let first = service
            .create("10.0.0.1", "https://example.com/path")
            .await
            .unwrap();
        let second = service
            .create("10.0.0.2", "https://example.com/path")
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let service = test_service(config());

        let err = service
            .create("10.0.0.1", "ftp://example.com/file")
            .await
            .unwrap_err();

        assert!(matches!(err, AllocError::InvalidInput(CoreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn over_limit_requests_allocate_nothing() {
        let service = test_service(
            ServiceConfig::builder()
                .base_url("https://sho.rt")
                .rate_limit(RateLimitPolicy::new(1, 60).unwrap())
                .build(),
        );

        service
            .create("10.0.0.1", "https://example.com/one")
            .await
            .unwrap();
        let writes = service.store().write_count();

        let err = service
            .create("10.0.0.1", "https://example.com/two")
            .await
            .unwrap_err();

        assert!(matches!(err, AllocError::RateLimited { .. }));
        // Only the counter moved.
        assert_eq!(service.store().write_count(), writes + 1);
        let two = NormalizedUrl::parse("https://example.com/two").unwrap();
        let keyspace = service.store().keyspace();
        assert!(service
            .store()
            .get(&keyspace.dedupe_key(&two.dedupe_hash()))
            .is_none());
    }
}
