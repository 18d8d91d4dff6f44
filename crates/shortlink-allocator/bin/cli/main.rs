mod cli;

use crate::cli::{Command, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use shortlink_allocator::{AllocateOptions, RateLimitPolicy, ServiceConfig, ShortlinkService};
use shortlink_codegen::{CodeSecret, HmacCandidates};
use shortlink_core::{AtomicStore, CounterStore, Keyspace, SystemClock};
use shortlink_store::{InMemoryStore, RedisStore};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    shortlink_telemetry::init(config.log_format)?;

    let secret = CodeSecret::new(config.code_secret.as_bytes())
        .context("invalid code secret")?;
    let candidates = HmacCandidates::new(&secret)?;
    let keyspace = match &config.key_namespace {
        Some(namespace) => Keyspace::namespaced(namespace),
        None => Keyspace::default(),
    };
    let service_config = ServiceConfig::builder()
        .base_url(config.base_url.clone())
        .resolve_path(config.resolve_path.clone())
        .allocate(AllocateOptions::from_raw(
            config.code_length,
            config.max_retries,
            config.ttl_millis,
        )?)
        .rate_limit(RateLimitPolicy::new(
            config.rate_limit,
            config.rate_window_seconds,
        )?)
        .build();

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        resolve_path = %config.resolve_path,
        code_length = config.code_length,
        max_retries = config.max_retries,
        "starting shortlink"
    );

    match config.storage {
        StorageBackendArg::InMemory => {
            let store = InMemoryStore::with_clock(keyspace, SystemClock);
            let service = ShortlinkService::new(store, candidates, service_config);
            run(&service, config.command).await
        }
        StorageBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .context("redis url is required when storage backend is redis")?;
            let store = RedisStore::connect(&redis_url, keyspace)
                .await
                .context("failed to connect to Redis")?
                .with_timeout(Duration::from_millis(config.redis_timeout_millis));

            let service = ShortlinkService::new(store.clone(), candidates, service_config);
            let result = run(&service, config.command).await;
            drop(service);
            store.close().await;
            result
        }
    }
}

async fn run<S>(
    service: &ShortlinkService<S, HmacCandidates>,
    command: Command,
) -> anyhow::Result<()>
where
    S: AtomicStore + CounterStore,
{
    match command {
        Command::Allocate { urls, origin } => {
            for url in urls {
                let created = service
                    .create(&origin, &url)
                    .await
                    .with_context(|| format!("failed to shorten '{url}'"))?;
                println!("{} {}", created.code, created.short_url);
            }
        }
    }
    Ok(())
}
