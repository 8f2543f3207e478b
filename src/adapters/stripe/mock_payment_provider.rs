//! Mock payment provider for testing.
//!
//! Holds provider objects in memory and supports:
//! - Pre-configured subscriptions, invoices and payment intents
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::payments::{Invoice, PaymentIntent, Subscription};
use crate::ports::{PaymentError, PaymentProvider};

/// Mock payment provider for testing.
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_subscription(subscription);
/// mock.set_method_error("get_invoice", PaymentError::network("down"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    subscriptions: HashMap<String, Subscription>,
    invoices: HashMap<String, Invoice>,
    payment_intents: HashMap<String, PaymentIntent>,
    voided_invoices: Vec<String>,
    deleted_subscriptions: Vec<String>,
    method_errors: HashMap<String, PaymentError>,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_subscription(&self, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_invoice(&self, invoice: Invoice) {
        self.state().invoices.insert(invoice.id.clone(), invoice);
    }

    pub fn add_payment_intent(&self, intent: PaymentIntent) {
        self.state().payment_intents.insert(intent.id.clone(), intent);
    }

    /// Fails every call to `method` until cleared.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.state().subscriptions.get(id).cloned()
    }

    pub fn voided_invoices(&self) -> Vec<String> {
        self.state().voided_invoices.clone()
    }

    pub fn deleted_subscriptions(&self) -> Vec<String> {
        self.state().deleted_subscriptions.clone()
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, method: &str, args: Vec<String>) -> Result<MutexGuard<'_, MockState>, PaymentError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentError> {
        let state = self.begin("get_subscription", vec![subscription_id.to_string()])?;
        state
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("Subscription {}", subscription_id)))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError> {
        let state = self.begin("get_invoice", vec![invoice_id.to_string()])?;
        state
            .invoices
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("Invoice {}", invoice_id)))
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let state = self.begin("get_payment_intent", vec![payment_intent_id.to_string()])?;
        state
            .payment_intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("PaymentIntent {}", payment_intent_id)))
    }

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), PaymentError> {
        let mut args = vec![subscription_id.to_string()];
        args.extend(metadata.iter().map(|(k, v)| format!("{}={}", k, v)));
        let mut state = self.begin("update_subscription_metadata", args)?;
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found(&format!("Subscription {}", subscription_id)))?;
        subscription
            .metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), PaymentError> {
        let mut state = self.begin("void_invoice", vec![invoice_id.to_string()])?;
        state.voided_invoices.push(invoice_id.to_string());
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let mut state = self.begin("delete_subscription", vec![subscription_id.to_string()])?;
        state.deleted_subscriptions.push(subscription_id.to_string());
        Ok(())
    }
}
