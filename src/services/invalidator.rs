//! Staggered feed-cache invalidation for newly published content.
//!
//! Invalidating every interested user's feed at once would synchronize their
//! next cache misses into a recomputation stampede. Instead the sweep runs
//! in fixed-size batches: within a batch all soft invalidations are issued
//! concurrently; the next batch starts only after the previous batch has
//! fully settled and the inter-batch delay has elapsed. Combined with soft
//! (TTL-shortening) invalidation this bounds the instantaneous fan-out.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::InvalidationConfig;
use crate::error::Result;
use crate::models::Content;
use crate::services::{FeedInvalidator, InterestIndex};

/// Outcome of one invalidation sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidationSweep {
    pub users_targeted: usize,
    pub batches: usize,
    pub failures: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct SmartCacheInvalidator {
    config: InvalidationConfig,
}

impl SmartCacheInvalidator {
    pub fn new(config: InvalidationConfig) -> Self {
        Self { config }
    }

    /// Soft-invalidate the feed of every user interested in the content.
    ///
    /// Per-user failures are logged and counted, never propagated: one
    /// broken cache entry must not abort the batch or the sweep. Only the
    /// interest lookup itself can fail the call. A sweep in progress runs
    /// to completion; an interrupted sweep is repaired by the next publish
    /// event or natural TTL expiry.
    pub async fn invalidate_for_content(
        &self,
        content: &Content,
        index: &dyn InterestIndex,
        feeds: &dyn FeedInvalidator,
    ) -> Result<InvalidationSweep> {
        let mut sweep = InvalidationSweep {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let users = index
            .users_by_interest(content.subject.as_deref(), content.grade.as_deref())
            .await?;
        sweep.users_targeted = users.len();

        if users.is_empty() {
            debug!(content_id = %content.id, "No interested users, skipping sweep");
            sweep.completed_at = Some(Utc::now());
            return Ok(sweep);
        }

        info!(
            content_id = %content.id,
            subject = content.subject.as_deref().unwrap_or("-"),
            grade = content.grade.as_deref().unwrap_or("-"),
            users = users.len(),
            batch_size = self.config.batch_size,
            "Starting staggered feed invalidation sweep"
        );

        for (batch_idx, batch) in users.chunks(self.config.batch_size.max(1)).enumerate() {
            if batch_idx > 0 {
                // The delay counts from the previous batch's settlement, so
                // batch N+1 never starts before batch N finished + delay.
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }

            let results = join_all(batch.iter().map(|user_id| async move {
                feeds
                    .invalidate_user_feed(user_id)
                    .await
                    .map_err(|e| (user_id.as_str(), e))
            }))
            .await;

            for result in results {
                if let Err((user_id, e)) = result {
                    warn!(
                        user_id = user_id,
                        content_id = %content.id,
                        error = %e,
                        "Feed invalidation failed, continuing sweep"
                    );
                    sweep.failures += 1;
                }
            }

            sweep.batches += 1;
            debug!(
                content_id = %content.id,
                batch = batch_idx + 1,
                users = batch.len(),
                "Invalidation batch settled"
            );
        }

        sweep.completed_at = Some(Utc::now());
        info!(
            content_id = %content.id,
            users = sweep.users_targeted,
            batches = sweep.batches,
            failures = sweep.failures,
            "Feed invalidation sweep completed"
        );

        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::{MockFeedInvalidator, MockInterestIndex};

    fn content() -> Content {
        Content {
            id: "c1".to_string(),
            subject: Some("math".to_string()),
            grade: Some("9th Grade".to_string()),
        }
    }

    fn invalidator(batch_size: usize, delay_ms: u64) -> SmartCacheInvalidator {
        SmartCacheInvalidator::new(InvalidationConfig {
            batch_size,
            batch_delay_ms: delay_ms,
            soft_ttl_secs: 60,
        })
    }

    #[tokio::test]
    async fn test_empty_interest_set_short_circuits() {
        let inv = invalidator(100, 500);
        let mut index = MockInterestIndex::new();
        index
            .expect_users_by_interest()
            .returning(|_, _| Ok(Vec::new()));
        let feeds = MockFeedInvalidator::new();

        let sweep = inv
            .invalidate_for_content(&content(), &index, &feeds)
            .await
            .unwrap();
        assert_eq!(sweep.users_targeted, 0);
        assert_eq!(sweep.batches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partition_into_exact_batches() {
        let inv = invalidator(100, 500);
        let mut index = MockInterestIndex::new();
        index
            .expect_users_by_interest()
            .returning(|_, _| Ok((0..250).map(|i| format!("u{}", i)).collect()));

        let mut feeds = MockFeedInvalidator::new();
        feeds
            .expect_invalidate_user_feed()
            .times(250)
            .returning(|_| Ok(()));

        let sweep = inv
            .invalidate_for_content(&content(), &index, &feeds)
            .await
            .unwrap();
        assert_eq!(sweep.users_targeted, 250);
        assert_eq!(sweep.batches, 3);
        assert_eq!(sweep.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_failure_does_not_abort_batch_or_sweep() {
        let inv = invalidator(100, 500);
        let mut index = MockInterestIndex::new();
        index
            .expect_users_by_interest()
            .returning(|_, _| Ok((0..250).map(|i| format!("u{}", i)).collect()));

        let mut feeds = MockFeedInvalidator::new();
        feeds
            .expect_invalidate_user_feed()
            .times(250)
            .returning(|user_id| {
                if user_id == "u17" {
                    Err(AppError::Dependency("broken entry".into()))
                } else {
                    Ok(())
                }
            });

        let sweep = inv
            .invalidate_for_content(&content(), &index, &feeds)
            .await
            .unwrap();
        // All 250 were attempted (the times(250) expectation) despite the failure.
        assert_eq!(sweep.failures, 1);
        assert_eq!(sweep.batches, 3);
    }

    #[tokio::test]
    async fn test_interest_lookup_failure_propagates() {
        let inv = invalidator(100, 500);
        let mut index = MockInterestIndex::new();
        index
            .expect_users_by_interest()
            .returning(|_, _| Err(AppError::Dependency("index unavailable".into())));
        let feeds = MockFeedInvalidator::new();

        let result = inv.invalidate_for_content(&content(), &index, &feeds).await;
        assert!(matches!(result, Err(AppError::Dependency(_))));
    }
}
