//! Fire-and-forget alerts to the chat sinks.
//!
//! Every send is bounded by a timeout and its failure is logged and dropped.
//! Notifications never retry and never influence the reconciliation result.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::ordering::Order;
use crate::domain::payments::ReconcileError;
use crate::ports::{colors, Notification, NotificationChannel, Notifier};

/// Whether an idempotent replay of a settled payment is announced again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPolicy {
    /// One success notice per payment; replays are silent.
    #[default]
    OncePerPayment,
    /// Every delivery of a settled payment produces a notice.
    EveryDelivery,
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    policy: NotificationPolicy,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration, policy: NotificationPolicy) -> Self {
        Self {
            notifier,
            timeout,
            policy,
        }
    }

    pub async fn fulfillment_succeeded(&self, order: &Order) {
        let title = if order.order_id.is_renewal() {
            "Subscription renewed"
        } else {
            "New order"
        };
        let mut notification = Notification::new(title, colors::SUCCESS)
            .field("Order", order.order_id)
            .field("Product", &order.product_name)
            .field("Quantity", order.quantity)
            .field("Length", format!("{} days", order.length))
            .field("Total", format_minor_units(order.total))
            .field("Status", order.status);
        if let Some(coupon) = &order.coupon_name {
            notification = notification.field("Coupon", coupon);
        }
        if let Some(referral) = &order.note {
            notification = notification.field("Referral", referral);
        }
        self.dispatch(NotificationChannel::FulfillmentSuccess, notification)
            .await;
    }

    /// Announces a replayed payment when the policy asks for it.
    pub async fn payment_replayed(&self, payment_id: &str) {
        if self.policy != NotificationPolicy::EveryDelivery {
            return;
        }
        let notification = Notification::new("Payment redelivered", colors::WARNING)
            .field("Payment", payment_id);
        self.dispatch(NotificationChannel::FulfillmentSuccess, notification)
            .await;
    }

    pub async fn fulfillment_failed(&self, event_id: &str, event_type: &str, error: &ReconcileError) {
        let notification = Notification::new("Fulfillment failed", colors::FAILURE)
            .field("Event", event_id)
            .field("Type", event_type)
            .field("Code", error.code())
            .field("Error", error)
            .field("Will retry", error.is_retryable());
        self.dispatch(NotificationChannel::FulfillmentFailure, notification)
            .await;
    }

    pub async fn webhook_rejected(&self, error: &ReconcileError) {
        let notification = Notification::new("Webhook rejected", colors::FAILURE)
            .field("Code", error.code())
            .field("Error", error);
        self.dispatch(NotificationChannel::WebhookFailure, notification)
            .await;
    }

    async fn dispatch(&self, channel: NotificationChannel, notification: Notification) {
        match tokio::time::timeout(self.timeout, self.notifier.send(channel, &notification)).await {
            Ok(Ok(())) => {
                tracing::debug!(?channel, title = %notification.title, "Notification sent");
            }
            Ok(Err(e)) => {
                tracing::warn!(?channel, error = %e, "Notification failed");
            }
            Err(_) => {
                tracing::warn!(?channel, timeout_ms = self.timeout.as_millis() as u64, "Notification timed out");
            }
        }
    }
}

fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
