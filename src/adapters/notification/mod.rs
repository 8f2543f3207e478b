//! Notification adapters.

mod chat_webhook;
mod recording;

pub use chat_webhook::ChatWebhookNotifier;
pub use recording::RecordingNotifier;
