use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use personalization_service::cache::{AlgorithmCache, CacheConfig};
use personalization_service::config::Config;
use personalization_service::db::PgRepository;
use personalization_service::handlers::{
    algorithm_metrics, content_published, drift_check, grade_transition, health,
    prometheus_metrics, run_maintenance, AppState,
};
use personalization_service::jobs::{MaintenanceJob, MaintenanceJobConfig};
use personalization_service::middleware::JwtAuthMiddleware;
use personalization_service::services::{
    DriftDetector, HealthMonitor, LogAlertNotifier, SmartCacheInvalidator,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Structured JSON logging with env-filter overrides
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting personalization-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    let monitor = HealthMonitor::new(config.monitor.clone());

    let cache = match AlgorithmCache::new(
        &config.redis.url,
        CacheConfig {
            soft_ttl: Duration::from_secs(config.invalidation.soft_ttl_secs),
        },
        monitor.clone(),
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Redis connection failed: {:#}", e);
            eprintln!("ERROR: Failed to connect to Redis: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(PgRepository::new(db_pool));
    let cache = Arc::new(cache);
    let detector = Arc::new(DriftDetector::new(config.algorithm.clone()));
    let invalidator = Arc::new(SmartCacheInvalidator::new(config.invalidation.clone()));
    let notifier = Arc::new(LogAlertNotifier);

    let maintenance = Arc::new(MaintenanceJob::new(
        MaintenanceJobConfig {
            batch_size: config.invalidation.batch_size,
            batch_delay_ms: config.invalidation.batch_delay_ms,
            window_days: config.algorithm.window_days,
            ..Default::default()
        },
        Arc::clone(&detector),
        repo.clone(),
        repo.clone(),
        cache.clone(),
        cache.clone(),
        monitor.clone(),
    ));

    let state = web::Data::new(AppState {
        detector,
        invalidator,
        monitor,
        notifier,
        interactions: repo.clone(),
        directory: repo.clone(),
        interest_index: repo,
        vectors: cache.clone(),
        feeds: cache,
        maintenance,
        cron_secret: config.auth.cron_secret.clone(),
    });

    let jwt_secret = config.auth.jwt_secret.clone();
    let port = config.app.port;
    tracing::info!(port = port, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .service(
                web::scope("/api/v1/algorithm")
                    .wrap(JwtAuthMiddleware::new(&jwt_secret))
                    .service(drift_check)
                    .service(grade_transition)
                    .service(algorithm_metrics),
            )
            .service(
                web::scope("/internal")
                    .service(run_maintenance)
                    .service(content_published),
            )
            .service(health)
            .service(prometheus_metrics)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
