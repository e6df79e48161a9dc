//! Notification port.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub icon_url: Option<String>,
}

/// Where worker notifications go.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Create the channel if it does not exist yet. Must be idempotent.
    async fn create_channel(&self, id: &str, name: &str) -> anyhow::Result<()>;

    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn create_channel(&self, id: &str, name: &str) -> anyhow::Result<()> {
        tracing::debug!(channel = id, "Notification channel ready: {}", name);
        Ok(())
    }

    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        tracing::info!(
            channel = %notification.channel_id,
            icon = notification.icon_url.as_deref().unwrap_or(""),
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}
