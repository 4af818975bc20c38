//! Activity tier classification and adaptive cache TTLs.
//!
//! Hot users get short vector TTLs so their profiles track behavior closely;
//! dormant users keep cheap long-lived entries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vector TTL for callers with no activity tier at hand.
pub const DEFAULT_VECTOR_TTL: Duration = Duration::from_secs(7200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    VeryActive,
    Active,
    Moderate,
    Inactive,
}

/// Classify a user by average interactions per day.
///
/// Account age is coerced to at least one day so fresh accounts with a burst
/// of activity classify as very active rather than dividing by zero.
pub fn activity_level(interaction_count: u64, account_age_days: i64) -> ActivityLevel {
    let age_days = account_age_days.max(1) as f64;
    let per_day = interaction_count as f64 / age_days;

    if per_day > 20.0 {
        ActivityLevel::VeryActive
    } else if per_day > 5.0 {
        ActivityLevel::Active
    } else if per_day > 1.0 {
        ActivityLevel::Moderate
    } else {
        ActivityLevel::Inactive
    }
}

/// Cache TTL for a user's interest vector by activity tier.
pub fn adaptive_ttl(level: ActivityLevel) -> Duration {
    let secs = match level {
        ActivityLevel::VeryActive => 180,
        ActivityLevel::Active => 900,
        ActivityLevel::Moderate => 3600,
        ActivityLevel::Inactive => 14400,
    };
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        // Boundaries sit at 20, 5 and 1 average interactions per day.
        assert_eq!(activity_level(201, 10), ActivityLevel::VeryActive);
        assert_eq!(activity_level(200, 10), ActivityLevel::Active);
        assert_eq!(activity_level(51, 10), ActivityLevel::Active);
        assert_eq!(activity_level(50, 10), ActivityLevel::Moderate);
        assert_eq!(activity_level(11, 10), ActivityLevel::Moderate);
        assert_eq!(activity_level(10, 10), ActivityLevel::Inactive);
        assert_eq!(activity_level(0, 10), ActivityLevel::Inactive);
    }

    #[test]
    fn test_zero_age_coerced() {
        assert_eq!(activity_level(25, 0), ActivityLevel::VeryActive);
        assert_eq!(activity_level(0, 0), ActivityLevel::Inactive);
    }

    #[test]
    fn test_monotonic_in_count_for_fixed_age() {
        let mut last = activity_rank(activity_level(0, 7));
        for count in 1..400 {
            let rank = activity_rank(activity_level(count, 7));
            assert!(rank >= last, "tier dropped at count={}", count);
            last = rank;
        }
    }

    #[test]
    fn test_monotonic_in_age_for_fixed_count() {
        let mut last = activity_rank(activity_level(100, 1));
        for age in 2..200 {
            let rank = activity_rank(activity_level(100, age));
            assert!(rank <= last, "tier rose at age={}", age);
            last = rank;
        }
    }

    #[test]
    fn test_ttl_strictly_decreasing_with_intensity() {
        let inactive = adaptive_ttl(ActivityLevel::Inactive);
        let moderate = adaptive_ttl(ActivityLevel::Moderate);
        let active = adaptive_ttl(ActivityLevel::Active);
        let very_active = adaptive_ttl(ActivityLevel::VeryActive);

        assert_eq!(inactive, Duration::from_secs(14400));
        assert_eq!(moderate, Duration::from_secs(3600));
        assert_eq!(active, Duration::from_secs(900));
        assert_eq!(very_active, Duration::from_secs(180));
        assert!(inactive > moderate && moderate > active && active > very_active);
    }

    fn activity_rank(level: ActivityLevel) -> u8 {
        match level {
            ActivityLevel::Inactive => 0,
            ActivityLevel::Moderate => 1,
            ActivityLevel::Active => 2,
            ActivityLevel::VeryActive => 3,
        }
    }
}
