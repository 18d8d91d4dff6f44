use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{RedisError, RedisResult, Script};
use shortlink_core::error::{Result, StoreError};
use shortlink_core::{
    AtomicStore, CodeCommit, CommitOutcome, CounterStore, DedupeHash, Keyspace, ShortCode,
    WindowCount,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Claims a code and optionally records the dedupe pointer.
///
/// KEYS[1] = mapping key, KEYS[2] = dedupe key (absent when not deduplicating)
/// ARGV[1] = long url, ARGV[2] = code, ARGV[3] = ttl millis (0 = permanent)
///
/// Returns `{status, code}`: 1 committed, 0 collision, 2 dedupe pointer
/// already present (code holds its value).
const COMMIT_SCRIPT: &str = r"
if KEYS[2] then
  local existing = redis.call('GET', KEYS[2])
  if existing then
    return {2, existing}
  end
end
if redis.call('EXISTS', KEYS[1]) == 1 then
  return {0, ''}
end
local ttl = tonumber(ARGV[3]) or 0
if ttl > 0 then
  redis.call('SET', KEYS[1], ARGV[1], 'PX', ttl)
else
  redis.call('SET', KEYS[1], ARGV[1])
end
if KEYS[2] then
  if ttl > 0 then
    redis.call('SET', KEYS[2], ARGV[2], 'PX', ttl)
  else
    redis.call('SET', KEYS[2], ARGV[2])
  end
end
return {1, ''}
";

/// Fixed-window counter increment.
///
/// KEYS[1] = counter key, ARGV[1] = window seconds
///
/// Returns `{count, ttl}` where ttl follows `TTL` semantics.
const COUNTER_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {count, redis.call('TTL', KEYS[1])}
";

const COMMITTED: i64 = 1;
const COLLISION: i64 = 0;
const DEDUPLICATED: i64 = 2;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

fn map_redis_error(operation: &str, err: RedisError) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        StoreError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        StoreError::Unavailable(message)
    } else {
        StoreError::Operation(message)
    }
}

/// Clamps a TTL to whole milliseconds; sub-millisecond TTLs round up so they
/// never read as "permanent".
fn ttl_millis(ttl: Option<Duration>) -> u64 {
    match ttl {
        Some(ttl) if !ttl.is_zero() => u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1),
        _ => 0,
    }
}

/// A Redis-backed implementation of the store traits.
///
/// Commits and counter increments are Lua scripts invoked through
/// [`Script`], which sends `EVALSHA` and falls back to loading the script on
/// `NOSCRIPT`. Every call is bounded by a timeout; an expired call surfaces
/// as [`StoreError::Timeout`] because the caller cannot know whether the
/// script ran.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    keyspace: Keyspace,
    commit_script: Script,
    counter_script: Script,
    timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("keyspace", &self.keyspace)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Creates a store on top of an existing connection manager.
    pub fn new(conn: ConnectionManager, keyspace: Keyspace) -> Self {
        Self {
            conn,
            keyspace,
            commit_script: Script::new(COMMIT_SCRIPT),
            counter_script: Script::new(COUNTER_SCRIPT),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Opens a connection to `redis_url` and verifies it with `PING`.
    ///
    /// The connection manager reconnects on its own after transient
    /// failures. The connection lives until the last clone of the store is
    /// dropped or [`close`](Self::close)d.
    pub async fn connect(redis_url: &str, keyspace: Keyspace) -> Result<Self> {
        let client = ::redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = tokio::time::timeout(DEFAULT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout("failed to connect to Redis: timed out".to_string()))?
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;

        let store = Self::new(conn, keyspace);
        store.ping().await?;
        info!("Connected to Redis");
        Ok(store)
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(
            "failed to ping Redis",
            ::redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map(|_| ())
    }

    /// Consumes this handle. Equivalent to dropping it.
    ///
    /// [`ConnectionManager`] has no explicit shutdown: clones of the store
    /// share one connection, which closes when the last clone is dropped.
    /// Other clones stay usable after this call.
    pub async fn close(self) {
        debug!("Closing Redis store handle");
        drop(self);
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(error = %e, "{operation}");
                Err(map_redis_error(operation, e))
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "{operation}: timed out");
                Err(StoreError::Timeout(format!(
                    "{operation}: no reply within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn lookup_dedupe(&self, hash: &DedupeHash) -> Result<Option<ShortCode>> {
        let key = self.keyspace.dedupe_key(hash);
        trace!(dedupe = %hash, "Looking up dedupe index in Redis");

        let mut conn = self.conn.clone();
        let stored: Option<String> = self
            .bounded(
                "failed to read dedupe index from Redis",
                ::redis::cmd("GET").arg(&key).query_async(&mut conn),
            )
            .await?;

        stored
            .map(|code| {
                ShortCode::new(code).map_err(|e| {
                    StoreError::InvalidData(format!("invalid code under '{key}': {e}"))
                })
            })
            .transpose()
    }

    async fn try_commit_code(&self, commit: &CodeCommit) -> Result<CommitOutcome> {
        trace!(code = %commit.code, "Committing short code via Redis script");

        let mut invocation = self.commit_script.prepare_invoke();
        invocation.key(self.keyspace.code_key(&commit.code));
        if let Some(hash) = &commit.dedupe {
            invocation.key(self.keyspace.dedupe_key(hash));
        }
        invocation
            .arg(commit.long_url.as_str())
            .arg(commit.code.as_str())
            .arg(ttl_millis(commit.ttl));

        let mut conn = self.conn.clone();
        let (status, existing): (i64, String) = self
            .bounded(
                "failed to run commit script",
                invocation.invoke_async(&mut conn),
            )
            .await?;

        match status {
            COMMITTED => {
                debug!(code = %commit.code, "Committed mapping in Redis");
                Ok(CommitOutcome::Committed)
            }
            COLLISION => Ok(CommitOutcome::Collision),
            DEDUPLICATED => ShortCode::new(existing)
                .map(CommitOutcome::Deduplicated)
                .map_err(|e| StoreError::InvalidData(format!("invalid deduplicated code: {e}"))),
            other => Err(StoreError::InvalidData(format!(
                "unexpected commit script status {other}"
            ))),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        trace!(key, "Incrementing rate counter in Redis");

        let mut invocation = self.counter_script.prepare_invoke();
        invocation.key(key).arg(window.as_secs().max(1));

        let mut conn = self.conn.clone();
        let (count, ttl): (i64, i64) = self
            .bounded(
                "failed to run counter script",
                invocation.invoke_async(&mut conn),
            )
            .await?;

        let count = u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative counter under '{key}'")))?;

        Ok(WindowCount {
            count,
            ttl_seconds: u64::try_from(ttl).ok(),
        })
    }
}
