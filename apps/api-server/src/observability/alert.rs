//! Security alerting layer for tracing.
//!
//! Forwards every ERROR event, and WARN events on the `security` target
//! (address blocks, unblocks, failed admin logins), to an alert channel.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context};

/// Target used by security-relevant events.
pub const SECURITY_TARGET: &str = "security";

/// Alert message containing event details.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub level: String,
    pub message: String,
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub fields: Vec<(String, String)>,
}

impl AlertMessage {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn summary(&self) -> String {
        match (self.field("event"), self.field("ip")) {
            (Some(event), Some(ip)) => format!("{} ({}): {}", event, ip, self.message),
            _ => self.message.clone(),
        }
    }
}

/// Whether an event should raise an alert.
pub fn is_alertable(level: &Level, target: &str) -> bool {
    *level == Level::ERROR || (*level == Level::WARN && target == SECURITY_TARGET)
}

/// Trait for alert senders - implement this for different backends.
#[async_trait::async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Failed to send alert: {0}")]
    SendError(String),
}

/// Console alert sender - writes alerts to stderr (for development).
pub struct ConsoleAlertSender;

#[async_trait::async_trait]
impl AlertSender for ConsoleAlertSender {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError> {
        eprintln!(
            "[ALERT] {} {} {}: {}",
            alert.timestamp.to_rfc3339(),
            alert.level,
            alert.target,
            alert.summary()
        );
        Ok(())
    }
}

/// Webhook alert sender - posts alerts to a chat webhook (Slack, Discord, etc.).
pub struct WebhookAlertSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSender {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl AlertSender for WebhookAlertSender {
    async fn send(&self, alert: AlertMessage) -> Result<(), AlertError> {
        let fields: serde_json::Map<String, serde_json::Value> = alert
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let payload = serde_json::json!({
            "text": format!("*{}* `{}` {}", alert.level, alert.target, alert.summary()),
            "fields": fields,
            "timestamp": alert.timestamp.to_rfc3339(),
        });

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| AlertError::SendError(e.to_string()))?;

        Ok(())
    }
}

/// Tracing layer that queues alertable events for a background sender.
pub struct AlertLayer {
    sender: mpsc::Sender<AlertMessage>,
}

impl AlertLayer {
    /// Create a new alert layer with the given sender.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(alert_sender: Arc<dyn AlertSender>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertMessage>(100);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(e) = alert_sender.send(alert).await {
                    // Not through tracing: an ERROR here would feed back into this layer.
                    eprintln!("Failed to send alert: {}", e);
                }
            }
        });

        Self { sender: tx }
    }

    pub fn console() -> Self {
        Self::new(Arc::new(ConsoleAlertSender))
    }

    pub fn webhook(url: String) -> Self {
        Self::new(Arc::new(WebhookAlertSender::new(url)))
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !is_alertable(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let alert = AlertMessage {
            level: metadata.level().to_string(),
            message: visitor.message,
            target: metadata.target().to_string(),
            timestamp: chrono::Utc::now(),
            fields: visitor.fields,
        };

        // Dropped when the queue is full.
        let _ = self.sender.try_send(alert);
    }
}
