//! HTTP adapter for the external notification service.

use super::{Notification, NotificationDispatcher, NotifyError};
use reqwest::blocking::Client;
use std::time::Duration;

/// Posts notifications as JSON to one endpoint with a short per-call timeout.
pub struct HttpNotificationDispatcher {
    client: Client,
    endpoint: String,
}

impl HttpNotificationDispatcher {
    /// Builds a dispatcher for `endpoint`.
    ///
    /// # Errors
    /// - Returns `NotifyError::Rejected` when the endpoint is blank.
    /// - Returns `NotifyError::Transport` when the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(NotifyError::Rejected(
                "notification endpoint must not be blank".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl NotificationDispatcher for HttpNotificationDispatcher {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
