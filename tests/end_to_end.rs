use std::sync::Arc;
use std::time::Duration;

use rehydrate::{CacheError, Config, GetOutcome, SupervisionRoot};

fn fast_config() -> Config {
    // try_init: several tests in this binary run concurrently, each would
    // otherwise race to install the global subscriber.
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    Config {
        refresh_interval: Duration::from_millis(20),
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_key_is_busy_immediately_then_ready_after_one_tick() {
    let root = SupervisionRoot::new(fast_config());

    root.store("user:1", Arc::new("alice".to_string()), 1.0)
        .await
        .unwrap();
    assert!(matches!(root.get("user:1"), GetOutcome::Busy));

    tokio::time::advance(Duration::from_millis(25)).await;

    match root.get("user:1") {
        GetOutcome::Ready(value) => {
            assert_eq!(value.downcast_ref::<String>().unwrap(), "alice");
        }
        GetOutcome::Busy => panic!("expected Ready after a tick elapsed"),
        GetOutcome::Unknown => panic!("expected Ready, key should exist"),
    }
}

#[tokio::test]
async fn ttl_at_or_below_refresh_interval_is_rejected_without_starting_a_worker() {
    let root = SupervisionRoot::new(Config {
        refresh_interval: Duration::from_secs(4),
    });

    let err = root
        .store("k", Arc::new(1i32), 4.0)
        .await
        .expect_err("ttl equal to refresh interval must be rejected");
    assert!(matches!(err, CacheError::TtlTooLow { refresh_interval_ms: 4000 }));
    assert!(matches!(root.get("k"), GetOutcome::Unknown));
}

#[tokio::test]
async fn fractional_ttl_in_seconds_is_accepted() {
    let root = SupervisionRoot::new(fast_config());
    root.store("k", Arc::new(1i32), 1.5).await.unwrap();
    assert!(matches!(root.get("k"), GetOutcome::Busy));
}

#[tokio::test]
async fn default_ttl_two_argument_form_defaults_to_3600_seconds() {
    let root = SupervisionRoot::new(fast_config());
    root.store_default_ttl("HEL", Arc::new("V".to_string()))
        .await
        .unwrap();
    assert!(matches!(root.get("HEL"), GetOutcome::Busy));
    assert_eq!(rehydrate::DEFAULT_TTL_SECONDS, 3600.0);
}

#[tokio::test]
async fn default_config_uses_a_four_second_refresh_interval() {
    let config = Config::default();
    assert_eq!(config.refresh_interval_ms(), 4000);
}

#[tokio::test]
async fn non_positive_ttl_is_rejected() {
    let root = SupervisionRoot::new(fast_config());
    let zero = root.store("k", Arc::new(1i32), 0.0).await.unwrap_err();
    assert!(matches!(zero, CacheError::TtlNotPositive { .. }));

    let negative = root.store("k", Arc::new(1i32), -3.0).await.unwrap_err();
    assert!(matches!(negative, CacheError::TtlNotPositive { .. }));
}

#[tokio::test(start_paused = true)]
async fn key_expires_and_is_removed_after_ttl_with_no_further_writes() {
    let root = SupervisionRoot::new(fast_config());
    root.store("k", Arc::new(1i32), 0.05).await.unwrap();

    tokio::time::advance(Duration::from_millis(25)).await;
    assert!(matches!(root.get("k"), GetOutcome::Ready(_)));

    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(matches!(root.get("k"), GetOutcome::Unknown));
}

#[tokio::test(start_paused = true)]
async fn repeated_stores_within_ttl_keep_the_key_alive_indefinitely() {
    let root = SupervisionRoot::new(fast_config());
    root.store("k", Arc::new(0i32), 0.1).await.unwrap();

    for i in 1..=5 {
        tokio::time::advance(Duration::from_millis(40)).await;
        root.store("k", Arc::new(i), 0.1).await.unwrap();
    }

    tokio::time::advance(Duration::from_millis(25)).await;
    assert!(
        matches!(root.get("k"), GetOutcome::Ready(_) | GetOutcome::Busy),
        "key refreshed within every ttl window must never expire"
    );
}

#[tokio::test(start_paused = true)]
async fn integer_and_string_keys_are_independent() {
    let root = SupervisionRoot::new(fast_config());
    root.store(1i64, Arc::new("one"), 1.0).await.unwrap();
    root.store("1", Arc::new("string-one"), 1.0).await.unwrap();

    tokio::time::advance(Duration::from_millis(25)).await;

    let by_int = match root.get(1i64) {
        GetOutcome::Ready(v) => *v.downcast::<&str>().unwrap(),
        _ => panic!("expected Ready"),
    };
    let by_str = match root.get("1") {
        GetOutcome::Ready(v) => *v.downcast::<&str>().unwrap(),
        _ => panic!("expected Ready"),
    };
    assert_eq!(by_int, "one");
    assert_eq!(by_str, "string-one");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_workers_without_deleting_records() {
    let root = SupervisionRoot::new(fast_config());
    root.store("k", Arc::new(1i32), 1.0).await.unwrap();
    tokio::time::advance(Duration::from_millis(25)).await;
    assert!(matches!(root.get("k"), GetOutcome::Ready(_)));

    root.shutdown();
    tokio::time::advance(Duration::from_millis(100)).await;

    assert!(
        matches!(root.get("k"), GetOutcome::Ready(_)),
        "shutdown must leave existing records readable, just stop refreshing them"
    );
}
