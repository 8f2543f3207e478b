//! Notification sink configuration

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::application::NotificationPolicy;
use crate::ports::NotificationChannel;

use super::error::ValidationError;

/// Chat webhook sinks. Each channel is optional; unset channels are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub fulfillment_success_url: Option<String>,

    pub fulfillment_failure_url: Option<String>,

    pub webhook_failure_url: Option<String>,

    /// Per-send timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub policy: NotificationPolicy,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured sink per channel.
    pub fn channel_urls(&self) -> HashMap<NotificationChannel, String> {
        [
            (NotificationChannel::FulfillmentSuccess, &self.fulfillment_success_url),
            (NotificationChannel::FulfillmentFailure, &self.fulfillment_failure_url),
            (NotificationChannel::WebhookFailure, &self.webhook_failure_url),
        ]
        .into_iter()
        .filter_map(|(channel, url)| url.clone().map(|url| (channel, url)))
        .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let urls = [
            ("FULFILLMENT_SUCCESS_URL", &self.fulfillment_success_url),
            ("FULFILLMENT_FAILURE_URL", &self.fulfillment_failure_url),
            ("WEBHOOK_FAILURE_URL", &self.webhook_failure_url),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(ValidationError::InvalidNotificationUrl(name));
                }
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 30 {
            return Err(ValidationError::InvalidNotificationTimeout);
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            fulfillment_success_url: None,
            fulfillment_failure_url: None,
            webhook_failure_url: None,
            timeout_secs: default_timeout(),
            policy: NotificationPolicy::default(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}
