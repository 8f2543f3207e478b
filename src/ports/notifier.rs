//! Notifier port - outbound chat-webhook alerts.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::foundation::Timestamp;

/// Sink a notification is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationChannel {
    FulfillmentSuccess,
    FulfillmentFailure,
    WebhookFailure,
}

/// Embed colours used by the chat sinks.
pub mod colors {
    pub const SUCCESS: u32 = 0x2ECC71;
    pub const WARNING: u32 = 0xF1C40F;
    pub const FAILURE: u32 = 0xE74C3C;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub color: u32,
    pub fields: Vec<NotificationField>,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            color,
            fields: Vec::new(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push(NotificationField {
            name: name.into(),
            value: value.to_string(),
            inline: true,
        });
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no sink configured for {0:?}")]
    NotConfigured(NotificationChannel),

    #[error("sink rejected notification: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_inline_fields() {
        let n = Notification::new("Order fulfilled", colors::SUCCESS)
            .field("Order", "P1-0")
            .field("Quantity", 3);
        assert_eq!(n.fields.len(), 2);
        assert_eq!(n.fields[1].value, "3");
        assert!(n.fields.iter().all(|f| f.inline));
    }
}
