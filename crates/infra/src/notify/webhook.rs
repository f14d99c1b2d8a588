//! HTTP callback notifications.

use std::time::Duration;

use async_trait::async_trait;

use scribe_core::NotifyTarget;

use super::{DeliveryError, Notification, NotificationSink};

/// POSTs the notification as JSON to the target URL. Non-2xx is a failure.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Http(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn handles(&self, target: &NotifyTarget) -> bool {
        matches!(target, NotifyTarget::Webhook { .. })
    }

    async fn deliver(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let NotifyTarget::Webhook { url } = target else {
            return Err(DeliveryError::Unsupported(target.describe()));
        };

        self.client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| DeliveryError::Http(e.to_string()))?;
        Ok(())
    }
}
