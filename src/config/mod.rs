use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub algorithm: AlgorithmConfig,
    pub invalidation: InvalidationConfig,
    pub monitor: MonitorConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Tuning for drift detection and vector recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Interaction window considered for drift analysis, in days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Per-day decay applied to interaction weights (0.95 = 5%/day).
    #[serde(default = "default_daily_decay_rate")]
    pub daily_decay_rate: f64,
    /// Cosine distance above which a profile is considered drifted.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    /// Minimum interactions in the window before drift can be claimed.
    #[serde(default = "default_min_interactions")]
    pub min_interactions: usize,
    /// Fraction of prior subject weights retained across a grade transition.
    #[serde(default = "default_grade_carryover")]
    pub grade_carryover: f64,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            daily_decay_rate: default_daily_decay_rate(),
            drift_threshold: default_drift_threshold(),
            min_interactions: default_min_interactions(),
            grade_carryover: default_grade_carryover(),
        }
    }
}

/// Tuning for the staggered feed-cache invalidation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// TTL feed entries are shortened to on soft invalidation, in seconds.
    #[serde(default = "default_soft_ttl_secs")]
    pub soft_ttl_secs: u64,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            soft_ttl_secs: default_soft_ttl_secs(),
        }
    }
}

/// Alerting thresholds for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_max_drift_rate")]
    pub max_drift_rate: f64,
    #[serde(default = "default_min_cache_hit_ratio")]
    pub min_cache_hit_ratio: f64,
    #[serde(default = "default_max_invalidation_failure_ratio")]
    pub max_invalidation_failure_ratio: f64,
    /// Ratios are not evaluated until this many samples have accumulated.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_drift_rate: default_max_drift_rate(),
            min_cache_hit_ratio: default_min_cache_hit_ratio(),
            max_invalidation_failure_ratio: default_max_invalidation_failure_ratio(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Shared secret for the internal cron and content-published endpoints.
    pub cron_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            algorithm: AlgorithmConfig {
                window_days: env_parse("DRIFT_WINDOW_DAYS", default_window_days()),
                daily_decay_rate: env_parse("DAILY_DECAY_RATE", default_daily_decay_rate()),
                drift_threshold: env_parse("DRIFT_THRESHOLD", default_drift_threshold()),
                min_interactions: env_parse("DRIFT_MIN_INTERACTIONS", default_min_interactions()),
                grade_carryover: env_parse("GRADE_CARRYOVER", default_grade_carryover()),
            },
            invalidation: InvalidationConfig {
                batch_size: env_parse("INVALIDATION_BATCH_SIZE", default_batch_size()),
                batch_delay_ms: env_parse("INVALIDATION_BATCH_DELAY_MS", default_batch_delay_ms()),
                soft_ttl_secs: env_parse("INVALIDATION_SOFT_TTL_SECS", default_soft_ttl_secs()),
            },
            monitor: MonitorConfig {
                max_drift_rate: env_parse("MONITOR_MAX_DRIFT_RATE", default_max_drift_rate()),
                min_cache_hit_ratio: env_parse(
                    "MONITOR_MIN_CACHE_HIT_RATIO",
                    default_min_cache_hit_ratio(),
                ),
                max_invalidation_failure_ratio: env_parse(
                    "MONITOR_MAX_INVALIDATION_FAILURE_RATIO",
                    default_max_invalidation_failure_ratio(),
                ),
                min_samples: env_parse("MONITOR_MIN_SAMPLES", default_min_samples()),
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET")?,
                cron_secret: std::env::var("CRON_SECRET")?,
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_window_days() -> i64 {
    30
}

fn default_daily_decay_rate() -> f64 {
    0.95
}

fn default_drift_threshold() -> f64 {
    0.35
}

fn default_min_interactions() -> usize {
    5
}

fn default_grade_carryover() -> f64 {
    0.3
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_soft_ttl_secs() -> u64 {
    60
}

fn default_max_drift_rate() -> f64 {
    0.5
}

fn default_min_cache_hit_ratio() -> f64 {
    0.6
}

fn default_max_invalidation_failure_ratio() -> f64 {
    0.1
}

fn default_min_samples() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_defaults() {
        let config = AlgorithmConfig::default();
        assert_eq!(config.window_days, 30);
        assert_eq!(config.drift_threshold, 0.35);
        assert_eq!(config.min_interactions, 5);
    }

    #[test]
    fn test_invalidation_defaults() {
        let config = InvalidationConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_delay_ms, 500);
        assert_eq!(config.soft_ttl_secs, 60);
    }
}
