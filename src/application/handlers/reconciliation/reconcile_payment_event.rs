//! ReconcilePaymentEventHandler - applies one verified provider event to the store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::domain::foundation::Timestamp;
use crate::domain::ordering::{has_source, Order, OrderId, OrderStatus, PurchaseMetadata};
use crate::domain::payments::{
    CheckoutMode, CheckoutSession, Invoice, PaymentEvent, PaymentIntent, ReconcileError,
    ReconcileOutcome, Review, SkipReason, StripeEvent, StripeWebhookVerifier, Subscription,
    SIGNATURE_HEADER,
};
use crate::domain::storefront::StoreSettings;
use crate::ports::{
    Catalog, CustomerDirectory, OrderLedger, PaymentError, PaymentErrorCode, PaymentProvider,
    SettingsSource,
};

use super::fulfillment::{Fulfillment, OrderFulfiller, Purchase, RenewalPayment};
use super::idempotency::IdempotencyGuard;
use super::inventory::{InventoryCoordinator, StockMovement};
use super::notifications::NotificationDispatcher;
use super::settings::ReconcilerSettings;

/// Command carrying one raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcilePaymentEventCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value, `None` when the request had none.
    pub signature: Option<String>,
}

/// Storage and provider ports the reconciler works against.
#[derive(Clone)]
pub struct ReconcilerPorts {
    pub ledger: Arc<dyn OrderLedger>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub catalog: Arc<dyn Catalog>,
    pub settings: Arc<dyn SettingsSource>,
    pub provider: Arc<dyn PaymentProvider>,
}

/// Handler for verified payment events.
///
/// Each event kind maps to exactly one action. Every action checks the
/// source marker before touching the ledger, so objects created by other
/// integrations on the same provider account are acknowledged and ignored.
pub struct ReconcilePaymentEventHandler {
    verifier: StripeWebhookVerifier,
    settings: Arc<ReconcilerSettings>,
    store_settings: Arc<dyn SettingsSource>,
    ledger: Arc<dyn OrderLedger>,
    provider: Arc<dyn PaymentProvider>,
    guard: IdempotencyGuard,
    inventory: InventoryCoordinator,
    fulfiller: OrderFulfiller,
    notifications: NotificationDispatcher,
}

impl ReconcilePaymentEventHandler {
    pub fn new(
        ports: ReconcilerPorts,
        verifier: StripeWebhookVerifier,
        settings: ReconcilerSettings,
        notifications: NotificationDispatcher,
    ) -> Self {
        let settings = Arc::new(settings);
        Self {
            verifier,
            guard: IdempotencyGuard::new(ports.ledger.clone()),
            inventory: InventoryCoordinator::new(ports.catalog.clone()),
            fulfiller: OrderFulfiller::new(
                ports.ledger.clone(),
                ports.customers,
                ports.catalog,
                ports.provider.clone(),
                settings.clone(),
            ),
            store_settings: ports.settings,
            ledger: ports.ledger,
            provider: ports.provider,
            settings,
            notifications,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcilePaymentEventCommand,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // 1. Verify signature and parse the envelope
        let verified = match cmd.signature.as_deref() {
            Some(signature) => self.verifier.verify_and_parse(&cmd.payload, signature),
            None => Err(ReconcileError::MissingField(SIGNATURE_HEADER)),
        };
        let envelope = match verified {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Webhook rejected");
                self.notifications.webhook_rejected(&err).await;
                return Err(err);
            }
        };

        // 2. Apply it
        let span = tracing::info_span!(
            "reconcile",
            event_id = %envelope.id,
            event_type = %envelope.event_type
        );
        let result = self.reconcile(&envelope).instrument(span).await;

        // 3. Report
        match &result {
            Ok(outcome) => {
                tracing::info!(event_id = %envelope.id, outcome = outcome.label(), "Event reconciled");
                if let ReconcileOutcome::Skipped(reason) = outcome {
                    tracing::debug!(event_id = %envelope.id, %reason, "Event skipped");
                }
            }
            Err(err) if err.is_delivery_failure() => {
                tracing::warn!(event_id = %envelope.id, code = err.code(), error = %err, "Event rejected");
                self.notifications.webhook_rejected(err).await;
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::error!(event_id = %envelope.id, code = err.code(), error = %err, "Reconciliation failed, provider will retry");
                } else {
                    tracing::warn!(event_id = %envelope.id, code = err.code(), error = %err, "Reconciliation precondition failed");
                }
                self.notifications
                    .fulfillment_failed(&envelope.id, &envelope.event_type, err)
                    .await;
            }
        }
        result
    }

    /// Applies an already-verified envelope.
    pub async fn reconcile(&self, envelope: &StripeEvent) -> Result<ReconcileOutcome, ReconcileError> {
        if self.settings.require_livemode && !envelope.livemode {
            return Ok(ReconcileOutcome::Skipped(SkipReason::TestModeEvent));
        }

        let event = PaymentEvent::from_envelope(envelope)?;
        if let PaymentEvent::Unrecognized(kind) = event {
            return Ok(ReconcileOutcome::Skipped(SkipReason::UnrecognizedEvent(kind)));
        }

        let store = self.store_settings.load().await?;
        tracing::debug!(
            kind = event.kind(),
            cart_hold_active = store.cart_hold_active,
            "Dispatching event"
        );

        match event {
            PaymentEvent::CheckoutCompleted(session) => self.on_checkout_completed(&store, session).await,
            PaymentEvent::CheckoutExpired(session) => self.on_checkout_expired(&store, session).await,
            PaymentEvent::PaymentSucceeded(intent) => self.on_payment_succeeded(&store, intent).await,
            PaymentEvent::SubscriptionDeleted(subscription) => {
                self.on_subscription_deleted(subscription).await
            }
            PaymentEvent::InvoiceUncollectible(invoice) => self.on_invoice_uncollectible(invoice).await,
            PaymentEvent::ReviewClosed(review) => self.on_review_closed(review).await,
            PaymentEvent::Unrecognized(kind) => {
                Ok(ReconcileOutcome::Skipped(SkipReason::UnrecognizedEvent(kind)))
            }
        }
    }

    // ════════════════════════════════════════════════════════════════
    // Checkout
    // ════════════════════════════════════════════════════════════════

    async fn on_checkout_completed(
        &self,
        store: &StoreSettings,
        session: CheckoutSession,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(metadata) = self.metadata(&session.metadata)? else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };

        match session.mode {
            CheckoutMode::Payment => self.fulfill_checkout_payment(store, session, metadata).await,
            CheckoutMode::Subscription if metadata.trial => {
                self.fulfill_trial(store, session, metadata).await
            }
            CheckoutMode::Subscription => self.link_subscription(session, metadata).await,
            CheckoutMode::Setup | CheckoutMode::Unknown => {
                Ok(ReconcileOutcome::Skipped(SkipReason::UnsupportedMode))
            }
        }
    }

    async fn fulfill_checkout_payment(
        &self,
        store: &StoreSettings,
        session: CheckoutSession,
        metadata: PurchaseMetadata,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let payment_id = session
            .payment_intent
            .clone()
            .ok_or(ReconcileError::MissingField("payment_intent"))?;

        if self.guard.already_applied(&payment_id).await? {
            return Ok(self.replayed(payment_id).await);
        }

        let intent = self.provider.get_payment_intent(&payment_id).await?;
        let length = metadata.period.unwrap_or(self.settings.default_period_days);
        let purchase = Purchase {
            payment_id: payment_id.clone(),
            email: session.email().map(str::to_string),
            checkout_name: session.customer_details.as_ref().and_then(|d| d.name.clone()),
            provider_customer_id: session.customer.clone(),
            total: session.amount_total.unwrap_or_else(|| intent.amount_paid()),
            payment_status: session.payment_status.clone().unwrap_or_else(|| "paid".to_string()),
            length,
            under_review: intent.has_open_review(),
            subscription_id: None,
            metadata,
        };
        let fulfillment = self.fulfiller.fulfill_purchase(store, purchase).await?;
        self.finish(fulfillment, payment_id, false).await
    }

    /// Trial starts have no payment intent; the session id stands in for it.
    async fn fulfill_trial(
        &self,
        store: &StoreSettings,
        session: CheckoutSession,
        metadata: PurchaseMetadata,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if self.guard.already_applied(&session.id).await? {
            return Ok(self.replayed(session.id).await);
        }

        let purchase = Purchase {
            payment_id: session.id.clone(),
            email: session.email().map(str::to_string),
            checkout_name: session.customer_details.as_ref().and_then(|d| d.name.clone()),
            provider_customer_id: session.customer.clone(),
            total: session.amount_total.unwrap_or(0),
            payment_status: session.payment_status.clone().unwrap_or_else(|| "trial".to_string()),
            length: store.trial_days,
            under_review: false,
            subscription_id: session.subscription.clone(),
            metadata,
        };
        let fulfillment = self.fulfiller.fulfill_purchase(store, purchase).await?;
        self.finish(fulfillment, session.id, false).await
    }

    /// Records the subscription id on the order its metadata names.
    async fn link_subscription(
        &self,
        session: CheckoutSession,
        metadata: PurchaseMetadata,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let subscription_id = session
            .subscription
            .ok_or(ReconcileError::MissingField("subscription"))?;
        let subscription = self.provider.get_subscription(&subscription_id).await?;

        let named = self
            .metadata(&subscription.metadata)?
            .and_then(|m| m.order_id)
            .or(metadata.order_id);
        let Some(order_id) = named else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NoOrderReference));
        };

        self.require_order(&order_id).await?;
        self.ledger
            .set_ecom_order_id(&order_id, Some(&subscription_id))
            .await?;
        tracing::info!(order_id = %order_id, subscription_id = %subscription_id, "Subscription linked");
        Ok(ReconcileOutcome::SubscriptionLinked {
            order_id,
            subscription_id,
        })
    }

    async fn on_checkout_expired(
        &self,
        store: &StoreSettings,
        session: CheckoutSession,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(metadata) = self.metadata(&session.metadata)? else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };
        // Renewal checkouts never reserve stock.
        if metadata.order_id.is_some() {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NoReservation));
        }
        let Some((product_name, quantity)) = metadata.reservation() else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NoReservation));
        };

        match self
            .inventory
            .release(store, &session.id, product_name, quantity)
            .await?
        {
            StockMovement::Applied(_) => Ok(ReconcileOutcome::InventoryReleased {
                product_name: product_name.to_string(),
                quantity,
            }),
            StockMovement::HoldInactive => Ok(ReconcileOutcome::Skipped(SkipReason::CartHoldInactive)),
            StockMovement::AlreadyReleased => {
                Ok(ReconcileOutcome::Skipped(SkipReason::HoldAlreadyReleased))
            }
        }
    }

    // ════════════════════════════════════════════════════════════════
    // Subscription billing
    // ════════════════════════════════════════════════════════════════

    async fn on_payment_succeeded(
        &self,
        store: &StoreSettings,
        intent: PaymentIntent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // One-off payments are settled through checkout completion.
        let Some(invoice_id) = intent.invoice.clone() else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NotInvoiceLinked));
        };

        if self.guard.already_applied(&intent.id).await? {
            return Ok(self.replayed(intent.id).await);
        }

        let invoice = self.provider.get_invoice(&invoice_id).await?;
        let Some(subscription_id) = invoice.subscription.clone() else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NotInvoiceLinked));
        };
        let subscription = self.provider.get_subscription(&subscription_id).await?;
        let Some(metadata) = self.metadata(&subscription.metadata)? else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };

        let payment_status = intent.status.clone().unwrap_or_else(|| "succeeded".to_string());
        let under_review = intent.has_open_review();

        let renewal = metadata.order_id.is_some();
        let fulfillment = match metadata.order_id {
            Some(predecessor) => {
                let payment = RenewalPayment {
                    payment_id: intent.id.clone(),
                    predecessor,
                    subscription_id,
                    total: invoice.amount_paid,
                    payment_status,
                    length: metadata.period,
                    under_review,
                };
                self.fulfiller.fulfill_renewal(payment).await?
            }
            None => {
                let purchase = Purchase {
                    payment_id: intent.id.clone(),
                    email: invoice.customer_email.clone().or_else(|| intent.receipt_email.clone()),
                    checkout_name: None,
                    provider_customer_id: invoice.customer.clone().or_else(|| intent.customer.clone()),
                    total: invoice.amount_paid,
                    payment_status,
                    length: metadata.period.unwrap_or(self.settings.default_period_days),
                    under_review,
                    subscription_id: Some(subscription_id),
                    metadata,
                };
                self.fulfiller.fulfill_purchase(store, purchase).await?
            }
        };
        self.finish(fulfillment, intent.id, renewal).await
    }

    async fn on_subscription_deleted(
        &self,
        subscription: Subscription,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(metadata) = self.metadata(&subscription.metadata)? else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };
        let Some(order_id) = metadata.order_id else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::NoOrderReference));
        };

        let order = self.require_order(&order_id).await?;
        let status = match order.cancellation_outcome(Timestamp::now()) {
            Some(target) => self
                .ledger
                .update_status(&order_id, order.status, target)
                .await?
                .then_some(target),
            None => None,
        };
        self.ledger.set_ecom_order_id(&order_id, None).await?;

        tracing::info!(
            order_id = %order_id,
            subscription_id = %subscription.id,
            status = ?status,
            "Subscription cancellation recorded"
        );
        Ok(ReconcileOutcome::CancellationRecorded { order_id, status })
    }

    /// Voids the invoice and cancels the subscription it belongs to.
    async fn on_invoice_uncollectible(&self, invoice: Invoice) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };
        let subscription = self.provider.get_subscription(subscription_id).await?;
        if !has_source(&subscription.metadata, &self.settings.source_marker) {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        }

        settled(
            self.provider.void_invoice(&invoice.id).await,
            "invoice",
            &invoice.id,
        )?;
        settled(
            self.provider.delete_subscription(subscription_id).await,
            "subscription",
            subscription_id,
        )?;

        tracing::info!(invoice_id = %invoice.id, subscription_id, "Uncollectible invoice voided");
        Ok(ReconcileOutcome::InvoiceVoided {
            invoice_id: invoice.id,
        })
    }

    // ════════════════════════════════════════════════════════════════
    // Fraud review
    // ════════════════════════════════════════════════════════════════

    async fn on_review_closed(&self, review: Review) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(payment_id) = review.payment_intent.as_deref() else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        };

        let Some(order) = self.ledger.find_by_payment_id(payment_id).await? else {
            let intent = self.provider.get_payment_intent(payment_id).await?;
            if !has_source(&intent.metadata, &self.settings.source_marker) {
                return Ok(ReconcileOutcome::Skipped(SkipReason::ForeignSource));
            }
            return Err(ReconcileError::OrderNotFound(payment_id.to_string()));
        };

        let approved = review.is_approved();
        let Some(target) = order.review_outcome(approved) else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::StatusUnchanged));
        };
        if !self
            .ledger
            .update_status(&order.order_id, OrderStatus::Review, target)
            .await?
        {
            return Ok(ReconcileOutcome::Skipped(SkipReason::StatusUnchanged));
        }

        tracing::info!(order_id = %order.order_id, approved, status = %target, "Review resolved");
        Ok(ReconcileOutcome::ReviewResolved {
            order_id: order.order_id,
            status: target,
        })
    }

    // ════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════

    fn metadata(
        &self,
        map: &HashMap<String, String>,
    ) -> Result<Option<PurchaseMetadata>, ReconcileError> {
        Ok(PurchaseMetadata::parse(map, &self.settings.source_marker)?)
    }

    async fn require_order(&self, order_id: &OrderId) -> Result<Order, ReconcileError> {
        self.ledger
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(order_id.to_string()))
    }

    async fn finish(
        &self,
        fulfillment: Fulfillment,
        payment_id: String,
        renewal: bool,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match fulfillment {
            Fulfillment::Created(order) => {
                self.notifications.fulfillment_succeeded(&order).await;
                Ok(ReconcileOutcome::Fulfilled {
                    order_id: order.order_id,
                    payment_id: order.payment_id,
                    renewal,
                })
            }
            Fulfillment::AlreadyApplied => Ok(self.replayed(payment_id).await),
        }
    }

    async fn replayed(&self, payment_id: String) -> ReconcileOutcome {
        self.notifications.payment_replayed(&payment_id).await;
        ReconcileOutcome::AlreadyApplied { payment_id }
    }
}

/// Treats "already void" and "already cancelled" provider answers as done.
fn settled(result: Result<(), PaymentError>, object: &str, id: &str) -> Result<(), ReconcileError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if matches!(err.code, PaymentErrorCode::NotFound | PaymentErrorCode::InvalidRequest) => {
            tracing::info!(object, id, error = %err, "Provider object already settled");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::adapters::memory::{InMemoryCatalog, InMemoryCustomerDirectory, InMemoryOrderLedger};
    use crate::adapters::notification::RecordingNotifier;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::ordering::test_support::order_with;
    use crate::domain::payments::{sign_payload, StripeEventBuilder};
    use crate::domain::storefront::Product;
    use crate::ports::{NotificationChannel, StaticSettings};

    use super::super::notifications::NotificationPolicy;

    const SECRET: &str = "whsec_test_secret";
    const SOURCE: &str = "proxyshop";

    struct Harness {
        ledger: Arc<InMemoryOrderLedger>,
        catalog: Arc<InMemoryCatalog>,
        provider: MockPaymentProvider,
        notifier: Arc<RecordingNotifier>,
        handler: ReconcilePaymentEventHandler,
    }

    fn harness() -> Harness {
        harness_with(true, NotificationPolicy::OncePerPayment)
    }

    fn harness_with(cart_hold_active: bool, policy: NotificationPolicy) -> Harness {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.add_product(Product {
            name: "Residential".into(),
            stock: 10,
            preorder: false,
        });
        let provider = MockPaymentProvider::new();
        provider.add_payment_intent(intent("pi_1", None, None));
        let notifier = Arc::new(RecordingNotifier::new());

        let ports = ReconcilerPorts {
            ledger: ledger.clone(),
            customers: Arc::new(InMemoryCustomerDirectory::new()),
            catalog: catalog.clone(),
            settings: Arc::new(StaticSettings(StoreSettings {
                cart_hold_active,
                trial_days: 3,
            })),
            provider: Arc::new(provider.clone()),
        };
        let handler = ReconcilePaymentEventHandler::new(
            ports,
            StripeWebhookVerifier::new(SECRET),
            ReconcilerSettings::new(SOURCE, "proxyshop"),
            NotificationDispatcher::new(notifier.clone(), Duration::from_secs(1), policy),
        );
        Harness {
            ledger,
            catalog,
            provider,
            notifier,
            handler,
        }
    }

    fn intent(id: &str, invoice: Option<&str>, review: Option<&str>) -> PaymentIntent {
        serde_json::from_value(json!({
            "id": id,
            "amount": 1500,
            "status": "succeeded",
            "invoice": invoice,
            "review": review,
            "metadata": {"source": SOURCE},
        }))
        .unwrap()
    }

    fn subscription(id: &str, order_id: Option<&str>) -> Subscription {
        let mut metadata = json!({"source": SOURCE, "productName": "Residential", "quantity": "1"});
        if let Some(order_id) = order_id {
            metadata["orderId"] = json!(order_id);
        }
        serde_json::from_value(json!({"id": id, "status": "active", "metadata": metadata})).unwrap()
    }

    fn invoice(id: &str, subscription: &str) -> Invoice {
        serde_json::from_value(json!({
            "id": id,
            "subscription": subscription,
            "customer_email": "sub@example.com",
            "amount_paid": 1500,
        }))
        .unwrap()
    }

    fn checkout(mode: &str, metadata: Value) -> Value {
        json!({
            "id": "cs_1",
            "mode": mode,
            "payment_intent": "pi_1",
            "customer_details": {"email": "buyer@example.com", "name": "Buyer"},
            "amount_total": 2000,
            "payment_status": "paid",
            "metadata": metadata,
        })
    }

    fn ours() -> Value {
        json!({"source": SOURCE, "productName": "Residential", "quantity": "2"})
    }

    impl Harness {
        async fn deliver(&self, event_type: &str, object: Value) -> Result<ReconcileOutcome, ReconcileError> {
            let event = StripeEventBuilder::new(event_type).object(object).build();
            let payload = serde_json::to_string(&event).unwrap();
            let signature = sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload);
            self.handler
                .handle(ReconcilePaymentEventCommand {
                    payload: payload.into_bytes(),
                    signature: Some(signature),
                })
                .await
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Verification
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn bad_signature_is_rejected_and_reported() {
        let h = harness();
        let err = h
            .handler
            .handle(ReconcilePaymentEventCommand {
                payload: br#"{"id":"evt_1"}"#.to_vec(),
                signature: Some(format!("t={},v1={}", chrono::Utc::now().timestamp(), "00".repeat(32))),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::InvalidSignature));
        assert_eq!(h.notifier.sent_to(NotificationChannel::WebhookFailure).len(), 1);
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_and_reported() {
        let h = harness();
        let err = h
            .handler
            .handle(ReconcilePaymentEventCommand {
                payload: br#"{"id":"evt_1"}"#.to_vec(),
                signature: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::MissingField(SIGNATURE_HEADER)));
        assert_eq!(h.notifier.sent_to(NotificationChannel::WebhookFailure).len(), 1);
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_event_is_acknowledged() {
        let h = harness();
        let outcome = h.deliver("charge.refunded", json!({"id": "ch_1"})).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Skipped(SkipReason::UnrecognizedEvent("charge.refunded".into()))
        );
    }

    #[tokio::test]
    async fn test_mode_event_skipped_when_live_required() {
        let mut h = harness();
        h.handler.settings = Arc::new(ReconcilerSettings::new(SOURCE, "proxyshop").with_require_livemode(true));
        let outcome = h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::TestModeEvent));
        assert!(h.ledger.is_empty());
    }

    // ══════════════════════════════════════════════════════════════
    // Checkout
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn completed_checkout_creates_order_once() {
        let h = harness();
        let first = h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        assert!(matches!(first, ReconcileOutcome::Fulfilled { renewal: false, .. }));

        let again = h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        assert_eq!(
            again,
            ReconcileOutcome::AlreadyApplied {
                payment_id: "pi_1".into()
            }
        );
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.catalog.stock("Residential"), Some(8));
        assert_eq!(h.notifier.sent_to(NotificationChannel::FulfillmentSuccess).len(), 1);
    }

    #[tokio::test]
    async fn replay_is_announced_under_every_delivery_policy() {
        let h = harness_with(true, NotificationPolicy::EveryDelivery);
        h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        assert_eq!(h.notifier.sent_to(NotificationChannel::FulfillmentSuccess).len(), 2);
    }

    #[tokio::test]
    async fn foreign_checkout_is_ignored() {
        let h = harness();
        let metadata = json!({"source": "other-shop", "productName": "Residential"});
        let outcome = h.deliver("checkout.session.completed", checkout("payment", metadata)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        assert!(h.ledger.is_empty());
        assert_eq!(h.catalog.stock("Residential"), Some(10));
    }

    #[tokio::test]
    async fn open_review_places_order_in_review() {
        let h = harness();
        h.provider.add_payment_intent(intent("pi_1", None, Some("prv_1")));
        h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();
        assert_eq!(h.ledger.all()[0].status, OrderStatus::Review);
    }

    #[tokio::test]
    async fn unknown_product_is_acknowledged_with_failure_notice() {
        let h = harness();
        let metadata = json!({"source": SOURCE, "productName": "Mobile"});
        let err = h
            .deliver("checkout.session.completed", checkout("payment", metadata))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::OK);
        assert_eq!(h.notifier.sent_to(NotificationChannel::FulfillmentFailure).len(), 1);
    }

    #[tokio::test]
    async fn provider_outage_is_retried() {
        let h = harness();
        h.provider
            .set_method_error("get_payment_intent", PaymentError::network("connection reset"));
        let err = h
            .deliver("checkout.session.completed", checkout("payment", ours()))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn trial_checkout_uses_session_id_and_trial_length() {
        let h = harness();
        h.provider.add_subscription(subscription("sub_t", None));
        let mut session = checkout("subscription", json!({"source": SOURCE, "productName": "Residential", "trial": "true"}));
        session["subscription"] = json!("sub_t");

        h.deliver("checkout.session.completed", session).await.unwrap();
        let order = &h.ledger.all()[0];
        assert_eq!(order.payment_id, "cs_1");
        assert_eq!(order.length, 3);
        let sub = h.provider.subscription("sub_t").unwrap();
        assert_eq!(sub.metadata.get("orderId").map(String::as_str), Some("P1-0"));
    }

    #[tokio::test]
    async fn subscription_checkout_links_existing_order() {
        let h = harness();
        let mut order = order_with(OrderStatus::Active, None);
        order.order_id = OrderId::original(4);
        h.ledger.seed(order);
        h.provider.add_subscription(subscription("sub_1", Some("P4-0")));
        let mut session = checkout("subscription", ours());
        session["subscription"] = json!("sub_1");

        let outcome = h.deliver("checkout.session.completed", session).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::SubscriptionLinked { .. }));
        let stored = h.ledger.find_by_order_id(&OrderId::original(4)).await.unwrap().unwrap();
        assert_eq!(stored.ecom_order_id.as_deref(), Some("sub_1"));
    }

    #[tokio::test]
    async fn expired_checkout_releases_hold_once() {
        let h = harness();
        let released = h.deliver("checkout.session.expired", checkout("payment", ours())).await.unwrap();
        assert!(matches!(released, ReconcileOutcome::InventoryReleased { quantity: 2, .. }));

        let again = h.deliver("checkout.session.expired", checkout("payment", ours())).await.unwrap();
        assert_eq!(again, ReconcileOutcome::Skipped(SkipReason::HoldAlreadyReleased));
        assert_eq!(h.catalog.stock("Residential"), Some(12));
    }

    #[tokio::test]
    async fn expired_checkout_without_holds_leaves_stock() {
        let h = harness_with(false, NotificationPolicy::OncePerPayment);
        let outcome = h.deliver("checkout.session.expired", checkout("payment", ours())).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::CartHoldInactive));
        assert_eq!(h.catalog.stock("Residential"), Some(10));
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription billing
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn subscription_cycles_build_a_chain() {
        let h = harness();
        h.provider.add_subscription(subscription("sub_1", None));

        h.provider.add_invoice(invoice("in_1", "sub_1"));
        let first = h
            .deliver("payment_intent.succeeded", serde_json::to_value(intent("pi_c1", Some("in_1"), None)).unwrap())
            .await
            .unwrap();
        assert!(matches!(first, ReconcileOutcome::Fulfilled { renewal: false, .. }));

        h.provider.add_invoice(invoice("in_2", "sub_1"));
        let second = h
            .deliver("payment_intent.succeeded", serde_json::to_value(intent("pi_c2", Some("in_2"), None)).unwrap())
            .await
            .unwrap();
        match second {
            ReconcileOutcome::Fulfilled { order_id, renewal, .. } => {
                assert!(renewal);
                assert_eq!(order_id.to_string(), "P1-0-R1");
            }
            other => panic!("unexpected {:?}", other),
        }

        let root = h.ledger.find_by_order_id(&OrderId::original(1)).await.unwrap().unwrap();
        assert_eq!(root.next_chain, Some(OrderId::renewal_of(1, 1)));
        assert_eq!(root.ecom_order_id.as_deref(), Some("sub_1"));
    }

    #[tokio::test]
    async fn one_off_payment_intent_is_not_fulfilled_twice() {
        let h = harness();
        let outcome = h
            .deliver("payment_intent.succeeded", serde_json::to_value(intent("pi_1", None, None)).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::NotInvoiceLinked));
    }

    #[tokio::test]
    async fn cancellation_with_time_left_awaits_expiry() {
        let h = harness();
        let mut order = order_with(OrderStatus::Active, Some(Timestamp::now().plus_days(10)));
        order.ecom_order_id = Some("sub_1".into());
        let id = order.order_id;
        h.ledger.seed(order);

        let outcome = h
            .deliver(
                "customer.subscription.deleted",
                serde_json::to_value(subscription("sub_1", Some(&id.to_string()))).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::CancellationRecorded {
                order_id: id,
                status: Some(OrderStatus::AwaitingExpiry)
            }
        );
        let stored = h.ledger.find_by_order_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.ecom_order_id, None);
    }

    #[tokio::test]
    async fn cancellation_inside_grace_window_keeps_status() {
        let h = harness();
        let order = order_with(OrderStatus::Active, Some(Timestamp::now().plus_hours(2)));
        let id = order.order_id;
        h.ledger.seed(order);

        h.deliver(
            "customer.subscription.deleted",
            serde_json::to_value(subscription("sub_1", Some(&id.to_string()))).unwrap(),
        )
        .await
        .unwrap();
        let stored = h.ledger.find_by_order_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn uncollectible_invoice_is_voided_idempotently() {
        let h = harness();
        h.provider.add_subscription(subscription("sub_1", Some("P1-0")));
        let object = serde_json::to_value(invoice("in_9", "sub_1")).unwrap();

        h.deliver("invoice.marked_uncollectible", object.clone()).await.unwrap();
        assert_eq!(h.provider.voided_invoices(), vec!["in_9".to_string()]);
        assert_eq!(h.provider.deleted_subscriptions(), vec!["sub_1".to_string()]);

        h.provider
            .set_method_error("void_invoice", PaymentError::new(PaymentErrorCode::InvalidRequest, "already void"));
        let again = h.deliver("invoice.marked_uncollectible", object).await.unwrap();
        assert_eq!(again.label(), "invoice_voided");
    }

    // ══════════════════════════════════════════════════════════════
    // Fraud review
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn approved_review_releases_order() {
        let h = harness();
        h.provider.add_payment_intent(intent("pi_1", None, Some("prv_1")));
        h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();

        let review = json!({"id": "prv_1", "open": false, "reason": "approved", "payment_intent": "pi_1"});
        let outcome = h.deliver("review.closed", review.clone()).await.unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::ReviewResolved {
                status: OrderStatus::AwaitingProcessing,
                ..
            }
        ));

        let again = h.deliver("review.closed", review).await.unwrap();
        assert_eq!(again, ReconcileOutcome::Skipped(SkipReason::StatusUnchanged));
    }

    #[tokio::test]
    async fn refused_review_expires_order() {
        let h = harness();
        h.provider.add_payment_intent(intent("pi_1", None, Some("prv_1")));
        h.deliver("checkout.session.completed", checkout("payment", ours())).await.unwrap();

        let review = json!({"id": "prv_1", "open": false, "reason": "refunded_as_fraud", "payment_intent": "pi_1"});
        h.deliver("review.closed", review).await.unwrap();
        assert_eq!(h.ledger.all()[0].status, OrderStatus::Expired);
    }

    #[tokio::test]
    async fn review_for_unknown_order_is_precondition_failure() {
        let h = harness();
        let review = json!({"id": "prv_2", "open": false, "reason": "approved", "payment_intent": "pi_1"});
        let err = h.deliver("review.closed", review).await.unwrap_err();
        assert!(matches!(err, ReconcileError::OrderNotFound(_)));
    }
}
