use actix_web::{get, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::jobs::{MaintenanceKind, MaintenanceStats};

use super::{check_shared_secret, AppState};

#[derive(Debug, Deserialize)]
pub struct MaintenanceQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MaintenanceResponse {
    pub success: bool,
    pub stats: MaintenanceStats,
}

/// Scheduled maintenance trigger. `type=daily|weekly` selects the routine;
/// the caller is an external scheduler holding the shared secret.
#[get("/cron/algorithm-maintenance")]
pub async fn run_maintenance(
    req: HttpRequest,
    query: web::Query<MaintenanceQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    check_shared_secret(&req, &state.cron_secret)?;

    let kind: MaintenanceKind = query
        .kind
        .as_deref()
        .ok_or_else(|| AppError::Validation("type query parameter is required".to_string()))?
        .parse()?;

    let stats = state.maintenance.run(kind).await?;

    Ok(HttpResponse::Ok().json(MaintenanceResponse {
        success: true,
        stats,
    }))
}
