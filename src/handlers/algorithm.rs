use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::AuthenticatedUser;
use crate::models::DriftAnalysis;
use crate::services::{activity_level, adaptive_ttl, Alert, MetricsSnapshot};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct DriftCheckResponse {
    pub success: bool,
    pub analysis: DriftAnalysis,
    pub vector_recalculated: bool,
}

/// Run drift detection for the calling user; recompute and re-cache the
/// vector and soft-invalidate the feed when drift is found.
#[post("/drift-check")]
pub async fn drift_check(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = user.id.to_string();
    let check_start = Instant::now();

    let analysis = state
        .detector
        .detect_concept_drift(&user_id, state.interactions.as_ref(), state.vectors.as_ref())
        .await?;

    state
        .monitor
        .record_drift_check(analysis.has_drift, check_start.elapsed());
    metrics::record_drift_check(
        if analysis.has_drift { "drift" } else { "stable" },
        check_start.elapsed(),
    );

    let mut vector_recalculated = false;
    if analysis.has_drift {
        let vector = state
            .detector
            .recompute_vector(&user_id, state.interactions.as_ref())
            .await?;

        let age_days = state.directory.account_age_days(&user_id).await?;
        let level = activity_level(analysis.interactions_analyzed as u64, age_days);
        state
            .vectors
            .put_vector_with_ttl(&user_id, &vector, adaptive_ttl(level))
            .await?;
        state.feeds.invalidate_user_feed(&user_id).await?;

        state.monitor.record_recomputation();
        metrics::record_recomputation("drift");
        vector_recalculated = true;

        info!(
            user_id = %user_id,
            drift_score = analysis.drift_score,
            "Drift detected, interest vector recalculated"
        );
    }

    Ok(HttpResponse::Ok().json(DriftCheckResponse {
        success: true,
        analysis,
        vector_recalculated,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GradeTransitionRequest {
    pub new_grade: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GradeTransitionResponse {
    pub success: bool,
    pub old_grade: String,
    pub new_grade: String,
    pub message: String,
}

/// Apply a grade change: adjust the interest profile, invalidate the feed
/// and persist the user's new grade.
#[post("/grade-transition")]
pub async fn grade_transition(
    user: AuthenticatedUser,
    body: web::Json<GradeTransitionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let new_grade = body
        .new_grade
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| AppError::Validation("new_grade is required".to_string()))?;

    let user_id = user.id.to_string();
    let old_grade = state
        .directory
        .get_user_grade(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;

    state
        .detector
        .handle_grade_transition(
            &user_id,
            &old_grade,
            new_grade,
            state.vectors.as_ref(),
            state.feeds.as_ref(),
        )
        .await?;

    state.directory.set_user_grade(&user_id, new_grade).await?;

    state.monitor.record_grade_transition();
    state.monitor.record_recomputation();
    metrics::record_recomputation("grade_transition");

    Ok(HttpResponse::Ok().json(GradeTransitionResponse {
        success: true,
        old_grade,
        new_grade: new_grade.to_string(),
        message: "Interest profile adjusted for grade transition".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct AlgorithmMetricsResponse {
    pub success: bool,
    pub metrics: MetricsSnapshot,
    pub alerts: Vec<Alert>,
}

/// Admin-only operational metrics snapshot. Reading the snapshot also
/// triggers threshold evaluation and alerting.
#[get("/metrics")]
pub async fn algorithm_metrics(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !user.role.is_admin() {
        return Err(AppError::Authorization(
            "admin role required for algorithm metrics".to_string(),
        ));
    }

    let snapshot = state.monitor.get_metrics();
    let alerts = state
        .monitor
        .check_thresholds_and_alert(state.notifier.as_ref())
        .await;

    Ok(HttpResponse::Ok().json(AlgorithmMetricsResponse {
        success: true,
        metrics: snapshot,
        alerts,
    }))
}
