pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the pipeline components
pub use services::{
    activity_level, adaptive_ttl, ActivityLevel, DriftDetector, HealthMonitor,
    InvalidationSweep, MetricsSnapshot, SmartCacheInvalidator,
};
