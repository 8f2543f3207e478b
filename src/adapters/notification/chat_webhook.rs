//! Chat-webhook notifier (Discord-compatible embed payloads).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::ports::{Notification, NotificationChannel, NotificationField, Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookBody<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Serialize)]
struct Embed<'a> {
    title: &'a str,
    color: u32,
    fields: &'a [NotificationField],
    timestamp: String,
}

impl<'a> From<&'a Notification> for WebhookBody<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            embeds: [Embed {
                title: &n.title,
                color: n.color,
                fields: &n.fields,
                timestamp: n.timestamp.as_datetime().to_rfc3339(),
            }],
        }
    }
}

pub struct ChatWebhookNotifier {
    client: reqwest::Client,
    sinks: HashMap<NotificationChannel, String>,
}

impl ChatWebhookNotifier {
    /// Builds a notifier; channels without a URL are reported as not configured.
    pub fn new(sinks: HashMap<NotificationChannel, String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, sinks })
    }
}

#[async_trait]
impl Notifier for ChatWebhookNotifier {
    async fn send(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let url = self
            .sinks
            .get(&channel)
            .ok_or(NotifyError::NotConfigured(channel))?;

        let response = self
            .client
            .post(url)
            .json(&WebhookBody::from(notification))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}
