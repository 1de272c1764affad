use async_trait::async_trait;
use reqwest::Client;
use tracing::error;

use crate::domain::models::events::Notification;
use crate::domain::ports::NotificationDispatcher;
use crate::error::AppError;

/// Fire-and-forget HTTP dispatcher. One attempt, no retry: the engine never
/// blocks a booking transition on a notification.
pub struct HttpNotificationDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpNotificationDispatcher {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), AppError> {
        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Notification service connection error: {}", e);
                error!("{}", msg);
                AppError::GatewayUnavailable(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Notification service failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::GatewayUnavailable(msg));
        }

        Ok(())
    }
}
