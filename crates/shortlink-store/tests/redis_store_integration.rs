use std::time::Duration;

use redis::AsyncCommands;
use shortlink_core::{
    AtomicStore, CodeCommit, CommitOutcome, CounterStore, Keyspace, NormalizedUrl, ShortCode,
    StoreError,
};
use shortlink_store::RedisStore;
use shortlink_test_infra::redis::RedisServer;

/// Test fixture that owns a Redis container and a store connected to it.
struct RedisStoreFixture {
    server: RedisServer,
    store: RedisStore,
}

impl RedisStoreFixture {
    async fn start() -> Self {
        let server = RedisServer::start()
            .await
            .expect("Failed to start Redis server");
        let url = server.url().await.expect("Failed to get Redis url");
        let store = RedisStore::connect(&url, Keyspace::default())
            .await
            .expect("Failed to connect store");
        Self { server, store }
    }

    async fn raw(&self) -> redis::aio::MultiplexedConnection {
        self.server
            .connection()
            .await
            .expect("Failed to open Redis connection")
    }
}

fn commit(code: &str, url: &str, dedupe: bool, ttl: Option<Duration>) -> CodeCommit {
    let long_url = NormalizedUrl::parse(url).unwrap();
    CodeCommit {
        code: ShortCode::new(code).unwrap(),
        dedupe: dedupe.then(|| long_url.dedupe_hash()),
        long_url,
        ttl,
    }
}

#[tokio::test]
async fn test_commit_writes_mapping_and_dedupe_pointer() {
    let fixture = RedisStoreFixture::start().await;
    let request = commit("abc1234", "https://example.com/a", true, None);

    let outcome = fixture.store.try_commit_code(&request).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Committed);

    let mut conn = fixture.raw().await;
    let mapped: Option<String> = conn.get("sl:abc1234").await.unwrap();
    assert_eq!(mapped.as_deref(), Some("https://example.com/a"));

    let hash = request.long_url.dedupe_hash();
    let pointer: Option<String> = conn.get(format!("url:{}", hash.as_str())).await.unwrap();
    assert_eq!(pointer.as_deref(), Some("abc1234"));

    let found = fixture.store.lookup_dedupe(&hash).await.unwrap();
    assert_eq!(found, Some(ShortCode::new("abc1234").unwrap()));
}

#[tokio::test]
async fn test_collision_leaves_existing_mapping_untouched() {
    let fixture = RedisStoreFixture::start().await;

    let first = commit("abc1234", "https://example.com/first", false, None);
    let second = commit("abc1234", "https://example.com/second", true, None);

    assert_eq!(
        fixture.store.try_commit_code(&first).await.unwrap(),
        CommitOutcome::Committed
    );
    assert_eq!(
        fixture.store.try_commit_code(&second).await.unwrap(),
        CommitOutcome::Collision
    );

    let mut conn = fixture.raw().await;
    let mapped: Option<String> = conn.get("sl:abc1234").await.unwrap();
    assert_eq!(mapped.as_deref(), Some("https://example.com/first"));

    let hash = second.long_url.dedupe_hash();
    assert!(fixture.store.lookup_dedupe(&hash).await.unwrap().is_none());
}

#[tokio::test]
async fn test_existing_dedupe_pointer_wins_over_new_code() {
    let fixture = RedisStoreFixture::start().await;

    let first = commit("abc1234", "https://example.com/", true, None);
    let again = commit("zzz9999", "https://example.com/", true, None);

    fixture.store.try_commit_code(&first).await.unwrap();
    let outcome = fixture.store.try_commit_code(&again).await.unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Deduplicated(ShortCode::new("abc1234").unwrap())
    );

    let mut conn = fixture.raw().await;
    let exists: bool = conn.exists("sl:zzz9999").await.unwrap();
    assert!(!exists, "a deduplicated commit must not write the mapping");
}

#[tokio::test]
async fn test_ttl_applies_to_both_records() {
    let fixture = RedisStoreFixture::start().await;
    let request = commit(
        "ttl0001",
        "https://example.com/ttl",
        true,
        Some(Duration::from_secs(60)),
    );
    fixture.store.try_commit_code(&request).await.unwrap();

    let mut conn = fixture.raw().await;
    let mapping_ttl: i64 = conn.pttl("sl:ttl0001").await.unwrap();
    let dedupe_key = format!("url:{}", request.long_url.dedupe_hash().as_str());
    let dedupe_ttl: i64 = conn.pttl(&dedupe_key).await.unwrap();

    assert!(mapping_ttl > 0 && mapping_ttl <= 60_000);
    assert!(dedupe_ttl > 0 && dedupe_ttl <= 60_000);
}

#[tokio::test]
async fn test_zero_ttl_is_permanent() {
    let fixture = RedisStoreFixture::start().await;
    let request = commit("perm001", "https://example.com/p", false, Some(Duration::ZERO));
    fixture.store.try_commit_code(&request).await.unwrap();

    let mut conn = fixture.raw().await;
    let ttl: i64 = conn.pttl("sl:perm001").await.unwrap();
    assert_eq!(ttl, -1);
}

#[tokio::test]
async fn test_concurrent_commits_of_one_code_have_one_winner() {
    let fixture = RedisStoreFixture::start().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = fixture.store.clone();
        handles.push(tokio::spawn(async move {
            let request = commit("race001", &format!("https://example.com/{i}"), true, None);
            store.try_commit_code(&request).await.unwrap()
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap() == CommitOutcome::Committed {
            committed += 1;
        }
    }
    assert_eq!(committed, 1);
}

#[tokio::test]
async fn test_counter_sets_expiry_once_per_window() {
    let fixture = RedisStoreFixture::start().await;
    let window = Duration::from_secs(60);

    let first = fixture.store.incr_window("rl:1.2.3.4:0", window).await.unwrap();
    assert_eq!(first.count, 1);
    let ttl = first.ttl_seconds.expect("counter must carry a ttl");
    assert!(ttl > 0 && ttl <= 60);

    let second = fixture.store.incr_window("rl:1.2.3.4:0", window).await.unwrap();
    assert_eq!(second.count, 2);
    assert!(second.ttl_seconds.unwrap() <= ttl);
}

#[tokio::test]
async fn test_counter_restores_missing_expiry() {
    let fixture = RedisStoreFixture::start().await;
    let mut conn = fixture.raw().await;
    let _: () = conn.set("rl:stuck:0", 5).await.unwrap();

    let count = fixture
        .store
        .incr_window("rl:stuck:0", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(count.count, 6);
    assert!(count.ttl_seconds.is_some_and(|ttl| ttl <= 30));
}

#[tokio::test]
async fn test_corrupt_dedupe_pointer_is_invalid_data() {
    let fixture = RedisStoreFixture::start().await;
    let url = NormalizedUrl::parse("https://example.com/corrupt").unwrap();
    let hash = url.dedupe_hash();

    let mut conn = fixture.raw().await;
    let _: () = conn
        .set(format!("url:{}", hash.as_str()), "not a code!")
        .await
        .unwrap();

    let err = fixture.store.lookup_dedupe(&hash).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[tokio::test]
async fn test_close_leaves_other_clones_usable() {
    let fixture = RedisStoreFixture::start().await;
    let handle = fixture.store.clone();

    handle.close().await;

    fixture.store.ping().await.unwrap();
    let request = commit("open001", "https://example.com/open", false, None);
    assert_eq!(
        fixture.store.try_commit_code(&request).await.unwrap(),
        CommitOutcome::Committed
    );
}

#[tokio::test]
async fn test_counter_keys_follow_store_keyspace() {
    let fixture = RedisStoreFixture::start().await;
    let url = fixture.server.url().await.unwrap();
    let store = RedisStore::connect(&url, Keyspace::namespaced("tenant"))
        .await
        .unwrap();

    let key = store.keyspace().rate_key("1.2.3.4", 7);
    assert_eq!(key, "tenant:rl:1.2.3.4:7");
    assert_eq!(CounterStore::keyspace(&store), store.keyspace());
}

#[tokio::test]
async fn test_connect_to_unreachable_server_fails() {
    let result = RedisStore::connect("redis://127.0.0.1:1", Keyspace::default()).await;
    assert!(matches!(
        result,
        Err(StoreError::Unavailable(_) | StoreError::Timeout(_))
    ));
}
