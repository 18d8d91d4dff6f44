use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;
use shortlink_core::error::{Result, StoreError};
use shortlink_core::{
    AtomicStore, Clock, CodeCommit, CommitOutcome, CounterStore, DedupeHash, Keyspace, ShortCode,
    SystemClock, WindowCount,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Counter(u64),
}

/// In-memory storage entry.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expire_at: Option<Timestamp>,
}

impl Entry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expire_at.is_some_and(|expire_at| now >= expire_at)
    }
}

const SWEEP_INTERVAL: u64 = 64;

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    writes: u64,
}

impl State {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str, now: Timestamp) -> Option<&Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    /// Inserts `key`, sweeping every expired entry once per [`SWEEP_INTERVAL`] writes.
    ///
    /// Keys that are never read again (old rate windows) are only freed by
    /// the sweep.
    fn put(&mut self, key: String, value: Value, expire_at: Option<Timestamp>, now: Timestamp) {
        self.entries.insert(key, Entry { value, expire_at });
        self.writes += 1;
        if self.writes % SWEEP_INTERVAL == 0 {
            self.entries.retain(|_, e| !e.is_expired(now));
        }
    }
}

fn expiry(now: Timestamp, ttl: Option<Duration>) -> Result<Option<Timestamp>> {
    let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) else {
        return Ok(None);
    };
    let ttl = SignedDuration::try_from(ttl)
        .map_err(|e| StoreError::Operation(format!("ttl out of range: {e}")))?;
    now.checked_add(ttl)
        .map(Some)
        .map_err(|e| StoreError::Operation(format!("ttl out of range: {e}")))
}

/// Remaining lifetime in whole seconds, rounded the way Redis `TTL` rounds.
fn remaining_seconds(now: Timestamp, expire_at: Timestamp) -> u64 {
    let millis = expire_at.duration_since(now).as_millis().max(0);
    u64::try_from((millis + 500) / 1000).unwrap_or(u64::MAX)
}

/// In-memory implementation of the store traits.
///
/// A single mutex guards the whole map, so every commit and every counter
/// increment is indivisible. Expiry is evaluated lazily against the injected
/// [`Clock`]; an expired entry behaves exactly like a missing one.
#[derive(Debug)]
pub struct InMemoryStore<C = SystemClock> {
    state: Mutex<State>,
    keyspace: Keyspace,
    clock: C,
}

impl InMemoryStore<SystemClock> {
    /// Creates a new in-memory store using the default key layout.
    pub fn new() -> Self {
        Self::with_clock(Keyspace::default(), SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    pub fn with_clock(keyspace: Keyspace, clock: C) -> Self {
        Self {
            state: Mutex::new(State::default()),
            keyspace,
            clock,
        }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Returns the string stored under the raw `key`, if live.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.live(key, now) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Some(text.clone()),
            Some(Entry {
                value: Value::Counter(count),
                ..
            }) => Some(count.to_string()),
            None => None,
        }
    }

    /// Returns the URL mapped to `code`, if live.
    pub fn mapping(&self, code: &ShortCode) -> Option<String> {
        self.get(&self.keyspace.code_key(code))
    }

    /// Remaining lifetime of the raw `key`. `None` if missing or permanent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let expire_at = state.live(key, now)?.expire_at?;
        expire_at.duration_since(now).try_into().ok()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let state = self.state.lock();
        state.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of key writes performed since creation.
    pub fn write_count(&self) -> u64 {
        self.state.lock().writes
    }
}

#[async_trait]
impl<C: Clock> AtomicStore for InMemoryStore<C> {
    async fn lookup_dedupe(&self, hash: &DedupeHash) -> Result<Option<ShortCode>> {
        let key = self.keyspace.dedupe_key(hash);
        trace!(dedupe = %hash, "Looking up dedupe index in memory");

        match self.get(&key) {
            Some(code) => ShortCode::new(code)
                .map(Some)
                .map_err(|e| StoreError::InvalidData(format!("dedupe key '{key}': {e}"))),
            None => Ok(None),
        }
    }

    async fn try_commit_code(&self, commit: &CodeCommit) -> Result<CommitOutcome> {
        let code_key = self.keyspace.code_key(&commit.code);
        let dedupe_key = commit.dedupe.as_ref().map(|h| self.keyspace.dedupe_key(h));
        let now = self.clock.now();
        let expire_at = expiry(now, commit.ttl)?;

        let mut state = self.state.lock();

        if let Some(ref key) = dedupe_key {
            if let Some(Entry {
                value: Value::Text(existing),
                ..
            }) = state.live(key, now)
            {
                debug!(code = %existing, "Dedupe pointer already present, skipping commit");
                let existing = ShortCode::new(existing.clone())
                    .map_err(|e| StoreError::InvalidData(format!("dedupe key '{key}': {e}")))?;
                return Ok(CommitOutcome::Deduplicated(existing));
            }
        }

        if state.live(&code_key, now).is_some() {
            trace!(code = %commit.code, "Code already taken");
            return Ok(CommitOutcome::Collision);
        }

        state.put(
            code_key,
            Value::Text(commit.long_url.as_str().to_owned()),
            expire_at,
            now,
        );
        if let Some(key) = dedupe_key {
            state.put(
                key,
                Value::Text(commit.code.as_str().to_owned()),
                expire_at,
                now,
            );
        }

        debug!(code = %commit.code, "Committed mapping in memory");
        Ok(CommitOutcome::Committed)
    }
}

#[async_trait]
impl<C: Clock> CounterStore for InMemoryStore<C> {
    fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let (count, expire_at) = match state.live(key, now) {
            Some(Entry {
                value: Value::Counter(count),
                expire_at,
            }) => (count + 1, *expire_at),
            Some(Entry {
                value: Value::Text(_),
                ..
            }) => {
                return Err(StoreError::InvalidData(format!(
                    "key '{key}' does not hold a counter"
                )))
            }
            None => (1, expiry(now, Some(window))?),
        };

        state.put(key.to_owned(), Value::Counter(count), expire_at, now);

        Ok(WindowCount {
            count,
            ttl_seconds: expire_at.map(|at| remaining_seconds(now, at)),
        })
    }
}
