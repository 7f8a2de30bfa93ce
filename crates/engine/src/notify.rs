//! Finalization notifications.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use depot_core::config::NotifyConfig;
use depot_metadata::FileRow;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

/// Receives a notification when a file lands in the catalog.
///
/// Notification is fire-and-forget: failures are logged by the caller and
/// never fail the finalization itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn file_finalized(&self, file: &FileRow) -> EngineResult<()>;

    fn name(&self) -> &'static str;
}

/// Default notifier, does nothing.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn file_finalized(&self, _file: &FileRow) -> EngineResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// POSTs a JSON payload to a configured webhook URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn file_finalized(&self, file: &FileRow) -> EngineResult<()> {
        let created_at = file
            .created_at
            .format(&Rfc3339)
            .map_err(|e| EngineError::Task(e.to_string()))?;
        let payload = serde_json::json!({
            "event": "file.finalized",
            "id": file.id,
            "name": file.name,
            "original_name": file.original_name,
            "size_bytes": file.size_bytes,
            "mime_type": file.mime_type,
            "owner_id": file.owner_id,
            "created_at": created_at,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
        if !response.status().is_success() {
            return Err(EngineError::Task(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Build the configured notifier, defaulting to [`NoopNotifier`].
pub fn from_config(config: &Option<NotifyConfig>) -> Arc<dyn Notifier> {
    match config {
        Some(notify) => Arc::new(WebhookNotifier::new(notify.webhook_url.clone())),
        None => Arc::new(NoopNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_dispatch() {
        assert_eq!(from_config(&None).name(), "noop");
        let config = Some(NotifyConfig {
            webhook_url: "http://hooks.local/depot".to_string(),
        });
        assert_eq!(from_config(&config).name(), "webhook");
    }
}
