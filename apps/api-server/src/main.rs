//! # Turnstile API Server
//!
//! Actix-web host for the rate limiter and IP blocker: every route scope is
//! wrapped in a block-check + rate-check stage, and a background job sweeps
//! expired state.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Turnstile API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config);

    #[cfg(feature = "scheduler")]
    let scheduler = background::start_sweep(background::SchedulerConfig::from_env(), state.clone())
        .await
        .context("failed to start expiry sweep (check SWEEP_SCHEDULE)")?;

    #[cfg(not(feature = "scheduler"))]
    background::spawn_interval_sweep(state.clone(), background::SWEEP_INTERVAL);

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &app_state))
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    if let Some(mut scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::error!("Failed to stop scheduler: {}", e);
        }
    }

    Ok(())
}
