pub mod algorithm;
pub mod content;
pub mod maintenance;

use actix_web::{get, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::jobs::MaintenanceJob;
use crate::services::{
    AlertNotifier, DriftDetector, FeedInvalidator, HealthMonitor, InteractionSource,
    InterestIndex, SmartCacheInvalidator, UserDirectory, VectorStore,
};

pub use algorithm::{algorithm_metrics, drift_check, grade_transition};
pub use content::content_published;
pub use maintenance::run_maintenance;

/// Shared handler state. Collaborators are trait objects so tests can wire
/// in fakes without a database or Redis.
pub struct AppState {
    pub detector: Arc<DriftDetector>,
    pub invalidator: Arc<SmartCacheInvalidator>,
    pub monitor: HealthMonitor,
    pub notifier: Arc<dyn AlertNotifier>,
    pub interactions: Arc<dyn InteractionSource>,
    pub directory: Arc<dyn UserDirectory>,
    pub interest_index: Arc<dyn InterestIndex>,
    pub vectors: Arc<dyn VectorStore>,
    pub feeds: Arc<dyn FeedInvalidator>,
    pub maintenance: Arc<MaintenanceJob>,
    pub cron_secret: String,
}

/// Validate the bearer shared secret on internal endpoints.
pub(crate) fn check_shared_secret(req: &HttpRequest, expected: &str) -> Result<()> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Authentication("Missing bearer token".to_string()))?;

    if token != expected {
        return Err(AppError::Authentication("Invalid bearer token".to_string()));
    }
    Ok(())
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/metrics")]
pub async fn prometheus_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::gather())
}
