//! Scheduled maintenance sweeps over interest vectors.
//!
//! Triggered by an external scheduler through the cron endpoint. Two
//! routines:
//!
//! - **daily** — drift-gated: for each recently active user, run drift
//!   detection and recompute the vector only where drift is found.
//! - **weekly** — unconditional: rebuild every recently active user's
//!   vector and soft-invalidate their feed. Also repairs sweeps that were
//!   interrupted mid-run.
//!
//! Users are processed in batches with an inter-batch delay so the sweep
//! never floods the cache or the interactions store. Per-user failures are
//! logged and counted; the sweep continues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ActiveUser;
use crate::services::{
    activity_level, adaptive_ttl, DriftDetector, FeedInvalidator, HealthMonitor,
    InteractionSource, UserDirectory, VectorStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKind {
    Daily,
    Weekly,
}

impl MaintenanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceKind::Daily => "daily",
            MaintenanceKind::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for MaintenanceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(MaintenanceKind::Daily),
            "weekly" => Ok(MaintenanceKind::Weekly),
            other => Err(AppError::Validation(format!(
                "invalid maintenance type: {} (expected daily|weekly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceJobConfig {
    /// Users per batch.
    pub batch_size: usize,
    /// Delay between batches.
    pub batch_delay_ms: u64,
    /// Activity window for candidate selection, in days.
    pub window_days: i64,
    /// Upper bound on users per sweep.
    pub max_users: i64,
}

impl Default for MaintenanceJobConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 500,
            window_days: 30,
            max_users: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceStats {
    pub kind: Option<MaintenanceKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub users_processed: u32,
    pub drift_detected: u32,
    pub vectors_recalculated: u32,
    pub failures: u32,
    pub total_duration_ms: u64,
}

pub struct MaintenanceJob {
    config: MaintenanceJobConfig,
    detector: Arc<DriftDetector>,
    directory: Arc<dyn UserDirectory>,
    interactions: Arc<dyn InteractionSource>,
    vectors: Arc<dyn VectorStore>,
    feeds: Arc<dyn FeedInvalidator>,
    monitor: HealthMonitor,
}

impl MaintenanceJob {
    pub fn new(
        config: MaintenanceJobConfig,
        detector: Arc<DriftDetector>,
        directory: Arc<dyn UserDirectory>,
        interactions: Arc<dyn InteractionSource>,
        vectors: Arc<dyn VectorStore>,
        feeds: Arc<dyn FeedInvalidator>,
        monitor: HealthMonitor,
    ) -> Self {
        Self {
            config,
            detector,
            directory,
            interactions,
            vectors,
            feeds,
            monitor,
        }
    }

    /// Run a single maintenance pass of the given kind.
    pub async fn run(&self, kind: MaintenanceKind) -> Result<MaintenanceStats> {
        let start_time = Instant::now();
        let mut stats = MaintenanceStats {
            kind: Some(kind),
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(
            kind = kind.as_str(),
            batch_size = self.config.batch_size,
            window_days = self.config.window_days,
            "Starting algorithm maintenance pass"
        );

        let users = self
            .directory
            .recently_active_users(self.config.window_days, self.config.max_users)
            .await?;

        info!(user_count = users.len(), "Fetched maintenance candidates");

        for (batch_idx, batch) in users.chunks(self.config.batch_size.max(1)).enumerate() {
            if batch_idx > 0 && self.config.batch_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }

            for user in batch {
                stats.users_processed += 1;

                let outcome = match kind {
                    MaintenanceKind::Daily => self.refresh_if_drifted(user).await,
                    MaintenanceKind::Weekly => self.refresh_unconditionally(user).await,
                };

                match outcome {
                    Ok(UserOutcome {
                        drift_detected,
                        recalculated,
                    }) => {
                        if drift_detected {
                            stats.drift_detected += 1;
                        }
                        if recalculated {
                            stats.vectors_recalculated += 1;
                        }
                    }
                    Err(e) => {
                        stats.failures += 1;
                        error!(
                            user_id = %user.user_id,
                            kind = kind.as_str(),
                            error = %e,
                            "Maintenance failed for user, continuing sweep"
                        );
                    }
                }
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        metrics::record_maintenance_run(kind.as_str(), "success");
        info!(
            kind = kind.as_str(),
            processed = stats.users_processed,
            drift_detected = stats.drift_detected,
            recalculated = stats.vectors_recalculated,
            failures = stats.failures,
            duration_ms = stats.total_duration_ms,
            "Algorithm maintenance pass completed"
        );

        Ok(stats)
    }

    async fn refresh_if_drifted(&self, user: &ActiveUser) -> Result<UserOutcome> {
        let check_start = Instant::now();
        let analysis = self
            .detector
            .detect_concept_drift(&user.user_id, self.interactions.as_ref(), self.vectors.as_ref())
            .await?;
        self.monitor
            .record_drift_check(analysis.has_drift, check_start.elapsed());
        metrics::record_drift_check(
            if analysis.has_drift { "drift" } else { "stable" },
            check_start.elapsed(),
        );

        if !analysis.has_drift {
            return Ok(UserOutcome {
                drift_detected: false,
                recalculated: false,
            });
        }

        self.refresh_vector(user, "maintenance").await?;
        Ok(UserOutcome {
            drift_detected: true,
            recalculated: true,
        })
    }

    async fn refresh_unconditionally(&self, user: &ActiveUser) -> Result<UserOutcome> {
        self.refresh_vector(user, "maintenance").await?;
        Ok(UserOutcome {
            drift_detected: false,
            recalculated: true,
        })
    }

    async fn refresh_vector(&self, user: &ActiveUser, trigger: &str) -> Result<()> {
        let vector = self
            .detector
            .recompute_vector(&user.user_id, self.interactions.as_ref())
            .await?;

        let level = activity_level(user.interaction_count, user.account_age_days);
        self.vectors
            .put_vector_with_ttl(&user.user_id, &vector, adaptive_ttl(level))
            .await?;
        self.feeds.invalidate_user_feed(&user.user_id).await?;

        self.monitor.record_recomputation();
        metrics::record_recomputation(trigger);
        Ok(())
    }
}

struct UserOutcome {
    drift_detected: bool,
    recalculated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlgorithmConfig;
    use crate::models::{Interaction, InteractionKind};
    use crate::services::{
        MockFeedInvalidator, MockInteractionSource, MockUserDirectory, MockVectorStore,
    };
    use crate::config::MonitorConfig;
    use chrono::Duration as ChronoDuration;

    fn active_user(id: &str) -> ActiveUser {
        ActiveUser {
            user_id: id.to_string(),
            interaction_count: 300,
            account_age_days: 10,
        }
    }

    fn interactions() -> Vec<Interaction> {
        (0..8)
            .map(|i| Interaction {
                subject: Some("math".to_string()),
                grade: Some("9th Grade".to_string()),
                kind: InteractionKind::Like,
                occurred_at: Utc::now() - ChronoDuration::days(i),
            })
            .collect()
    }

    fn job(
        directory: MockUserDirectory,
        interactions: MockInteractionSource,
        vectors: MockVectorStore,
        feeds: MockFeedInvalidator,
    ) -> MaintenanceJob {
        MaintenanceJob::new(
            MaintenanceJobConfig {
                batch_delay_ms: 0,
                ..Default::default()
            },
            Arc::new(DriftDetector::new(AlgorithmConfig::default())),
            Arc::new(directory),
            Arc::new(interactions),
            Arc::new(vectors),
            Arc::new(feeds),
            HealthMonitor::new(MonitorConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_weekly_refreshes_every_candidate() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_recently_active_users()
            .returning(|_, _| Ok(vec![active_user("u1"), active_user("u2")]));

        let mut source = MockInteractionSource::new();
        source
            .expect_recent_interactions()
            .returning(|_, _| Ok(interactions()));

        let mut vectors = MockVectorStore::new();
        vectors
            .expect_put_vector_with_ttl()
            .times(2)
            // 300 interactions over 10 days = very active tier.
            .withf(|_, _, ttl| *ttl == Duration::from_secs(180))
            .returning(|_, _, _| Ok(()));

        let mut feeds = MockFeedInvalidator::new();
        feeds
            .expect_invalidate_user_feed()
            .times(2)
            .returning(|_| Ok(()));

        let stats = job(directory, source, vectors, feeds)
            .run(MaintenanceKind::Weekly)
            .await
            .unwrap();
        assert_eq!(stats.users_processed, 2);
        assert_eq!(stats.vectors_recalculated, 2);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_daily_skips_stable_users() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_recently_active_users()
            .returning(|_, _| Ok(vec![active_user("u1")]));

        let mut source = MockInteractionSource::new();
        source
            .expect_recent_interactions()
            .returning(|_, _| Ok(interactions()));

        let mut vectors = MockVectorStore::new();
        // Stored vector matches the all-math interaction mix: no drift,
        // so no recomputation may happen.
        vectors.expect_get_vector().returning(|_| {
            let mut stored = crate::models::InterestVector::empty(Some("9th Grade".to_string()));
            stored.weights[crate::models::subject_index("math").unwrap()] = 5.0;
            Ok(Some(stored))
        });

        let feeds = MockFeedInvalidator::new();

        let stats = job(directory, source, vectors, feeds)
            .run(MaintenanceKind::Daily)
            .await
            .unwrap();
        assert_eq!(stats.users_processed, 1);
        assert_eq!(stats.drift_detected, 0);
        assert_eq!(stats.vectors_recalculated, 0);
    }

    #[tokio::test]
    async fn test_per_user_failure_does_not_abort_sweep() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_recently_active_users()
            .returning(|_, _| Ok(vec![active_user("u1"), active_user("u2")]));

        let mut source = MockInteractionSource::new();
        source.expect_recent_interactions().returning(|user_id, _| {
            if user_id == "u1" {
                Err(AppError::Dependency("query timeout".into()))
            } else {
                Ok(interactions())
            }
        });

        let mut vectors = MockVectorStore::new();
        vectors
            .expect_put_vector_with_ttl()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut feeds = MockFeedInvalidator::new();
        feeds
            .expect_invalidate_user_feed()
            .times(1)
            .returning(|_| Ok(()));

        let stats = job(directory, source, vectors, feeds)
            .run(MaintenanceKind::Weekly)
            .await
            .unwrap();
        assert_eq!(stats.users_processed, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.vectors_recalculated, 1);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(
            "daily".parse::<MaintenanceKind>().unwrap(),
            MaintenanceKind::Daily
        );
        assert_eq!(
            "weekly".parse::<MaintenanceKind>().unwrap(),
            MaintenanceKind::Weekly
        );
        assert!("hourly".parse::<MaintenanceKind>().is_err());
    }
}
