//! Telemetry initialization - tracing and security alerting setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::observability::AlertLayer;

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Enable JSON logging (for production).
    pub json_logs: bool,
    /// Service name for tracing.
    pub service_name: String,
    /// Forward errors and security warnings to the alert sender.
    pub alerts_enabled: bool,
    /// Webhook URL for alerts (Slack, Discord, etc.).
    pub alert_webhook_url: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            service_name: "turnstile-api".to_string(),
            alerts_enabled: true,
            alert_webhook_url: None,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "turnstile-api".to_string()),
            alerts_enabled: std::env::var("ALERTS_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
        }
    }
}

/// Initialize telemetry (tracing and alerting).
///
/// Must run inside the tokio runtime: the alert layer spawns its sender task.
pub fn init_telemetry(config: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,api_server=debug,turnstile_infra=debug,security=info"));

    let alert_layer = config
        .alerts_enabled
        .then(|| match &config.alert_webhook_url {
            Some(url) => AlertLayer::webhook(url.clone()),
            None => AlertLayer::console(),
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.json_logs).then(|| tracing_subscriber::fmt::layer().pretty()))
        .with(alert_layer)
        .init();

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        alerts_enabled = config.alerts_enabled,
        alert_webhook = config.alert_webhook_url.is_some(),
        "Telemetry initialized"
    );
}
