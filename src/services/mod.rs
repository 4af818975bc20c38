pub mod activity;
pub mod drift;
pub mod invalidator;
pub mod monitor;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::models::{ActiveUser, Interaction, InterestVector};

pub use activity::{activity_level, adaptive_ttl, ActivityLevel, DEFAULT_VECTOR_TTL};
pub use drift::DriftDetector;
pub use invalidator::{InvalidationSweep, SmartCacheInvalidator};
pub use monitor::{Alert, AlertNotifier, HealthMonitor, LogAlertNotifier, MetricsSnapshot};

/// Source of a user's recent interaction history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionSource: Send + Sync {
    async fn recent_interactions(&self, user_id: &str, window_days: i64)
        -> Result<Vec<Interaction>>;
}

/// Storage for per-user interest vectors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn get_vector(&self, user_id: &str) -> Result<Option<InterestVector>>;

    async fn put_vector_with_ttl(
        &self,
        user_id: &str,
        vector: &InterestVector,
        ttl: Duration,
    ) -> Result<()>;

    /// Store with the fallback TTL, for callers with no activity tier at hand.
    async fn put_vector(&self, user_id: &str, vector: &InterestVector) -> Result<()> {
        self.put_vector_with_ttl(user_id, vector, DEFAULT_VECTOR_TTL)
            .await
    }
}

/// Soft invalidation of a user's cached feed pages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedInvalidator: Send + Sync {
    async fn invalidate_user_feed(&self, user_id: &str) -> Result<()>;
}

/// Resolves users interested in a subject/grade combination.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterestIndex: Send + Sync {
    async fn users_by_interest<'a>(
        &self,
        subject: Option<&'a str>,
        grade: Option<&'a str>,
    ) -> Result<Vec<String>>;
}

/// User records owned by the host application: grade cohort and activity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Current grade, or `NotFound` if the user does not exist.
    async fn get_user_grade(&self, user_id: &str) -> Result<Option<String>>;

    async fn set_user_grade(&self, user_id: &str, grade: &str) -> Result<()>;

    /// Users with interactions inside the window, with the counts the
    /// activity classifier needs. Ordered by user id for stable sweeps.
    async fn recently_active_users(&self, window_days: i64, limit: i64)
        -> Result<Vec<ActiveUser>>;

    async fn account_age_days(&self, user_id: &str) -> Result<i64>;
}
