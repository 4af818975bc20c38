//! Batching, pacing and failure-isolation behavior of the staggered
//! feed invalidation sweep, driven against in-memory fakes under a paused
//! tokio clock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

use personalization_service::config::InvalidationConfig;
use personalization_service::error::{AppError, Result};
use personalization_service::models::Content;
use personalization_service::services::{FeedInvalidator, InterestIndex};
use personalization_service::SmartCacheInvalidator;

struct FixedIndex {
    users: Vec<String>,
}

#[async_trait]
impl InterestIndex for FixedIndex {
    async fn users_by_interest<'a>(
        &self,
        _subject: Option<&'a str>,
        _grade: Option<&'a str>,
    ) -> Result<Vec<String>> {
        Ok(self.users.clone())
    }
}

/// Records the virtual time of every invalidation; optionally fails a
/// chosen user.
struct RecordingFeedStore {
    calls: Mutex<Vec<(String, Instant)>>,
    fail_user: Option<String>,
}

impl RecordingFeedStore {
    fn new(fail_user: Option<&str>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_user: fail_user.map(str::to_string),
        }
    }
}

#[async_trait]
impl FeedInvalidator for RecordingFeedStore {
    async fn invalidate_user_feed(&self, user_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), Instant::now()));
        if self.fail_user.as_deref() == Some(user_id) {
            return Err(AppError::Dependency("simulated cache failure".into()));
        }
        Ok(())
    }
}

fn invalidator() -> SmartCacheInvalidator {
    SmartCacheInvalidator::new(InvalidationConfig {
        batch_size: 100,
        batch_delay_ms: 500,
        soft_ttl_secs: 60,
    })
}

fn content() -> Content {
    Content {
        id: "post-1".to_string(),
        subject: Some("math".to_string()),
        grade: Some("9th Grade".to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn sweep_of_250_users_runs_exactly_three_paced_batches() {
    let index = FixedIndex {
        users: (0..250).map(|i| format!("u{}", i)).collect(),
    };
    let feeds = RecordingFeedStore::new(None);

    let sweep = invalidator()
        .invalidate_for_content(&content(), &index, &feeds)
        .await
        .unwrap();

    assert_eq!(sweep.users_targeted, 250);
    assert_eq!(sweep.batches, 3);
    assert_eq!(sweep.failures, 0);

    let calls = feeds.calls.lock().unwrap();
    assert_eq!(calls.len(), 250);

    // Batch boundaries fall at indices 100 and 200; each batch starts at
    // least the inter-batch delay after the previous one.
    let first_batch_start = calls[0].1;
    let second_batch_start = calls[100].1;
    let third_batch_start = calls[200].1;
    assert!(second_batch_start - first_batch_start >= Duration::from_millis(500));
    assert!(third_batch_start - second_batch_start >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn one_failing_user_does_not_stop_its_batch_or_later_batches() {
    let index = FixedIndex {
        users: (0..250).map(|i| format!("u{}", i)).collect(),
    };
    // u42 sits in the first batch; everything after it must still run.
    let feeds = RecordingFeedStore::new(Some("u42"));

    let sweep = invalidator()
        .invalidate_for_content(&content(), &index, &feeds)
        .await
        .unwrap();

    assert_eq!(sweep.failures, 1);
    assert_eq!(sweep.batches, 3);
    assert_eq!(feeds.calls.lock().unwrap().len(), 250);
}

/// In-memory model of the cache's soft-invalidation contract: a repeat
/// invalidation may only shorten an entry's expiry, never extend it
/// (the Redis layer enforces this with `EXPIRE <key> <ttl> LT`).
struct SoftTtlStore {
    soft_ttl: Duration,
    expiries: Mutex<HashMap<String, Instant>>,
}

impl SoftTtlStore {
    fn with_entry(key: &str, expires_in: Duration) -> Self {
        let mut expiries = HashMap::new();
        expiries.insert(key.to_string(), Instant::now() + expires_in);
        Self {
            soft_ttl: Duration::from_secs(60),
            expiries: Mutex::new(expiries),
        }
    }

    fn expiry(&self, key: &str) -> Option<Instant> {
        self.expiries.lock().unwrap().get(key).copied()
    }
}

#[async_trait]
impl FeedInvalidator for SoftTtlStore {
    async fn invalidate_user_feed(&self, user_id: &str) -> Result<()> {
        let mut expiries = self.expiries.lock().unwrap();
        if let Some(expiry) = expiries.get_mut(user_id) {
            let shortened = Instant::now() + self.soft_ttl;
            if shortened < *expiry {
                *expiry = shortened;
            }
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn repeat_soft_invalidation_never_extends_expiry() {
    let store = SoftTtlStore::with_entry("u1", Duration::from_secs(3600));

    store.invalidate_user_feed("u1").await.unwrap();
    let after_first = store.expiry("u1").unwrap();

    tokio::time::advance(Duration::from_secs(10)).await;
    store.invalidate_user_feed("u1").await.unwrap();
    let after_second = store.expiry("u1").unwrap();

    assert!(after_second <= after_first);
}
