use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::metrics;
use crate::models::Content;
use crate::services::InvalidationSweep;

use super::{check_shared_secret, AppState};

/// Payload emitted by the content service when a post is published.
#[derive(Debug, Deserialize)]
pub struct ContentPublishedEvent {
    pub content_id: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContentPublishedResponse {
    pub success: bool,
    pub sweep: InvalidationSweep,
}

/// Internal hook: stagger-invalidate the feed caches of every user
/// interested in the newly published content.
#[post("/content-published")]
pub async fn content_published(
    req: HttpRequest,
    body: web::Json<ContentPublishedEvent>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    check_shared_secret(&req, &state.cron_secret)?;

    let event = body.into_inner();
    info!(
        content_id = %event.content_id,
        subject = event.subject.as_deref().unwrap_or("-"),
        grade = event.grade.as_deref().unwrap_or("-"),
        "Handling content-published event"
    );

    let content = Content {
        id: event.content_id,
        subject: event.subject,
        grade: event.grade,
    };

    let sweep = state
        .invalidator
        .invalidate_for_content(&content, state.interest_index.as_ref(), state.feeds.as_ref())
        .await?;

    state
        .monitor
        .record_invalidation_sweep(sweep.users_targeted as u64, sweep.failures as u64);
    metrics::record_invalidation_sweep(sweep.users_targeted as u64, sweep.failures as u64);

    Ok(HttpResponse::Ok().json(ContentPublishedResponse {
        success: true,
        sweep,
    }))
}
