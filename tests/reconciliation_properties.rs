//! End-to-end reconciliation properties.
//!
//! Signed deliveries go through `ReconcilePaymentEventHandler::handle` against
//! in-memory storage, the mock provider and a recording notifier:
//! 1. One order per payment, however often it is delivered
//! 2. Renewals extend the chain with both pointers set
//! 3. Fresh order numbers exceed every existing original
//! 4. Stock is conserved while cart holds are active
//! 5. Cancellation respects the grace window
//! 6. Foreign objects never mutate the store
//! 7. Review outcomes only apply to orders under review

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use fulfillment_reconciler::adapters::{
    InMemoryCatalog, InMemoryCustomerDirectory, InMemoryOrderLedger, MockPaymentProvider,
    RecordingNotifier,
};
use fulfillment_reconciler::application::{
    NotificationDispatcher, NotificationPolicy, ReconcilePaymentEventCommand,
    ReconcilePaymentEventHandler, ReconcilerPorts, ReconcilerSettings,
};
use fulfillment_reconciler::domain::foundation::{CustomerId, Timestamp};
use fulfillment_reconciler::domain::ordering::{
    Order, OrderDraft, OrderId, OrderStatus, CANCELLATION_GRACE_HOURS,
};
use fulfillment_reconciler::domain::payments::{
    sign_payload, Invoice, PaymentIntent, ReconcileError, ReconcileOutcome, SkipReason,
    StripeWebhookVerifier, Subscription,
};
use fulfillment_reconciler::domain::storefront::{Product, StoreSettings};
use fulfillment_reconciler::ports::{NotificationChannel, OrderLedger, StaticSettings};

const SECRET: &str = "whsec_integration";
const SOURCE: &str = "proxyshop";
const PRODUCT: &str = "Residential";

// =============================================================================
// Fixture
// =============================================================================

struct Store {
    ledger: Arc<InMemoryOrderLedger>,
    catalog: Arc<InMemoryCatalog>,
    provider: MockPaymentProvider,
    notifier: Arc<RecordingNotifier>,
    handler: ReconcilePaymentEventHandler,
}

impl Store {
    fn new(cart_hold_active: bool) -> Self {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.add_product(Product {
            name: PRODUCT.into(),
            stock: 10,
            preorder: false,
        });
        let provider = MockPaymentProvider::new();
        let notifier = Arc::new(RecordingNotifier::new());

        let ports = ReconcilerPorts {
            ledger: ledger.clone(),
            customers: Arc::new(InMemoryCustomerDirectory::new()),
            catalog: catalog.clone(),
            settings: Arc::new(StaticSettings(StoreSettings {
                cart_hold_active,
                trial_days: 1,
            })),
            provider: Arc::new(provider.clone()),
        };
        let handler = ReconcilePaymentEventHandler::new(
            ports,
            StripeWebhookVerifier::new(SECRET),
            ReconcilerSettings::new(SOURCE, "proxyshop"),
            NotificationDispatcher::new(
                notifier.clone(),
                Duration::from_secs(1),
                NotificationPolicy::OncePerPayment,
            ),
        );

        Self {
            ledger,
            catalog,
            provider,
            notifier,
            handler,
        }
    }

    async fn deliver(&self, event_type: &str, object: Value) -> Result<ReconcileOutcome, ReconcileError> {
        let now = chrono::Utc::now().timestamp();
        let payload = json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "type": event_type,
            "created": now,
            "livemode": false,
            "data": { "object": object },
        })
        .to_string();
        let signature = sign_payload(SECRET, now, &payload);

        self.handler
            .handle(ReconcilePaymentEventCommand {
                payload: payload.into_bytes(),
                signature: Some(signature),
            })
            .await
    }

    fn add_intent(&self, id: &str, invoice: Option<&str>, review: Option<&str>) {
        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": id,
            "amount": 1500,
            "status": "succeeded",
            "invoice": invoice,
            "review": review,
            "metadata": { "source": SOURCE },
        }))
        .unwrap();
        self.provider.add_payment_intent(intent);
    }

    fn add_subscription(&self, id: &str, metadata: Value) {
        let subscription: Subscription =
            serde_json::from_value(json!({ "id": id, "status": "active", "metadata": metadata })).unwrap();
        self.provider.add_subscription(subscription);
    }

    fn add_invoice(&self, id: &str, subscription: &str) {
        let invoice: Invoice = serde_json::from_value(json!({
            "id": id,
            "subscription": subscription,
            "customer_email": "renewer@example.com",
            "amount_paid": 1500,
        }))
        .unwrap();
        self.provider.add_invoice(invoice);
    }

    fn seed(&self, order_id: OrderId, status: OrderStatus, expiry: Option<Timestamp>) -> Order {
        let mut order = Order::from_draft(order_id, draft(&format!("pi_seed_{}", order_id)), None, Timestamp::now());
        order.status = status;
        order.expiry = expiry;
        self.ledger.seed(order.clone());
        order
    }
}

fn draft(payment_id: &str) -> OrderDraft {
    OrderDraft {
        payment_id: payment_id.to_string(),
        customer_id: CustomerId::new(),
        product_name: PRODUCT.to_string(),
        status: OrderStatus::Active,
        payment_status: "paid".to_string(),
        quantity: 1,
        length: 30,
        total: 1500,
        location: None,
        dispatch_time: None,
        note: None,
        coupon_name: None,
        ecom_order_id: None,
    }
}

fn checkout(session_id: &str, intent_id: &str, metadata: Value) -> Value {
    json!({
        "id": session_id,
        "mode": "payment",
        "payment_intent": intent_id,
        "customer_details": { "email": "buyer@example.com", "name": "Buyer" },
        "amount_total": 2000,
        "payment_status": "paid",
        "metadata": metadata,
    })
}

fn ours(quantity: u32) -> Value {
    json!({ "source": SOURCE, "productName": PRODUCT, "quantity": quantity.to_string() })
}

fn foreign() -> Value {
    json!({ "source": "another-shop", "productName": PRODUCT, "quantity": "2", "orderId": "P1-0" })
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn redelivered_checkout_creates_exactly_one_order() {
    let store = Store::new(true);
    store.add_intent("pi_1", None, None);

    for _ in 0..3 {
        store
            .deliver("checkout.session.completed", checkout("cs_1", "pi_1", ours(2)))
            .await
            .unwrap();
    }

    assert_eq!(store.ledger.len(), 1);
    assert_eq!(store.catalog.stock(PRODUCT), Some(8));
    assert_eq!(store.notifier.sent_to(NotificationChannel::FulfillmentSuccess).len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_settle_once() {
    let store = Arc::new(Store::new(true));
    store.add_intent("pi_1", None, None);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .deliver("checkout.session.completed", checkout("cs_1", "pi_1", ours(1)))
                .await
        }));
    }

    let mut fulfilled = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            ReconcileOutcome::Fulfilled { .. } => fulfilled += 1,
            ReconcileOutcome::AlreadyApplied { .. } => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(fulfilled, 1);
    assert_eq!(store.ledger.len(), 1);
    assert_eq!(store.catalog.stock(PRODUCT), Some(9));
}

// =============================================================================
// Renewal chains and numbering
// =============================================================================

#[tokio::test]
async fn renewals_extend_the_chain() {
    let store = Store::new(false);
    store.seed(OrderId::original(100), OrderStatus::Active, None);
    store.add_subscription("sub_1", json!({ "source": SOURCE, "orderId": "P100-0" }));

    for (n, (intent, invoice)) in [("pi_r1", "in_1"), ("pi_r2", "in_2")].into_iter().enumerate() {
        store.add_invoice(invoice, "sub_1");
        store.add_intent(intent, Some(invoice), None);
        let object = json!({ "id": intent, "amount": 1500, "invoice": invoice, "metadata": {} });
        let outcome = store.deliver("payment_intent.succeeded", object).await.unwrap();
        match outcome {
            ReconcileOutcome::Fulfilled { order_id, renewal, .. } => {
                assert!(renewal);
                assert_eq!(order_id, OrderId::renewal_of(100, n as u32 + 1));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let root = store.ledger.find_by_order_id(&OrderId::original(100)).await.unwrap().unwrap();
    let r1 = store.ledger.find_by_order_id(&OrderId::renewal_of(100, 1)).await.unwrap().unwrap();
    let r2 = store.ledger.find_by_order_id(&OrderId::renewal_of(100, 2)).await.unwrap().unwrap();

    assert_eq!(root.next_chain, Some(r1.order_id));
    assert_eq!(r1.last_chain, Some(root.order_id));
    assert_eq!(r1.next_chain, Some(r2.order_id));
    assert_eq!(r2.last_chain, Some(r1.order_id));
    assert!(r2.is_chain_head());
    assert!(store.ledger.find_broken_links().await.unwrap().is_empty());
}

#[tokio::test]
async fn fresh_number_exceeds_existing_originals() {
    let store = Store::new(false);
    store.seed(OrderId::original(57), OrderStatus::Active, None);
    store.seed(OrderId::original(100), OrderStatus::Active, None);
    store.add_intent("pi_new", None, None);

    let outcome = store
        .deliver("checkout.session.completed", checkout("cs_new", "pi_new", ours(1)))
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::Fulfilled { order_id, .. } => assert_eq!(order_id, OrderId::original(101)),
        other => panic!("unexpected outcome {:?}", other),
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn stock_is_conserved_with_cart_holds() {
    let store = Store::new(true);
    store.add_intent("pi_1", None, None);

    store
        .deliver("checkout.session.completed", checkout("cs_1", "pi_1", ours(2)))
        .await
        .unwrap();
    assert_eq!(store.catalog.stock(PRODUCT), Some(8));

    // An abandoned checkout hands its held units back exactly once.
    for _ in 0..2 {
        store
            .deliver("checkout.session.expired", checkout("cs_2", "pi_2", ours(3)))
            .await
            .unwrap();
    }
    assert_eq!(store.catalog.stock(PRODUCT), Some(11));
}

#[tokio::test]
async fn checkout_without_quantity_moves_no_stock() {
    let store = Store::new(true);
    store.add_intent("pi_1", None, None);
    let no_quantity = json!({ "source": SOURCE, "productName": PRODUCT });

    store
        .deliver("checkout.session.completed", checkout("cs_1", "pi_1", no_quantity.clone()))
        .await
        .unwrap();
    assert_eq!(store.ledger.len(), 1);
    assert_eq!(store.catalog.stock(PRODUCT), Some(10));

    let expired = store
        .deliver("checkout.session.expired", checkout("cs_2", "pi_2", no_quantity))
        .await
        .unwrap();
    assert_eq!(expired, ReconcileOutcome::Skipped(SkipReason::NoReservation));
    assert_eq!(store.catalog.stock(PRODUCT), Some(10));
}

#[tokio::test]
async fn stock_is_untouched_without_cart_holds() {
    let store = Store::new(false);
    store.add_intent("pi_1", None, None);

    store
        .deliver("checkout.session.completed", checkout("cs_1", "pi_1", ours(2)))
        .await
        .unwrap();
    let expired = store
        .deliver("checkout.session.expired", checkout("cs_2", "pi_2", ours(3)))
        .await
        .unwrap();

    assert_eq!(expired, ReconcileOutcome::Skipped(SkipReason::CartHoldInactive));
    assert_eq!(store.catalog.stock(PRODUCT), Some(10));
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn grace_window_boundary_is_exclusive() {
    let now = Timestamp::now();
    let mut order = Order::from_draft(OrderId::original(1), draft("pi_1"), None, now);

    order.expiry = Some(now.plus_hours(CANCELLATION_GRACE_HOURS));
    assert_eq!(order.cancellation_outcome(now), None);

    order.expiry = Some(Timestamp::from_unix_secs(now.plus_hours(CANCELLATION_GRACE_HOURS).as_unix_secs() + 1).unwrap());
    assert_eq!(order.cancellation_outcome(now), Some(OrderStatus::AwaitingExpiry));
}

#[tokio::test]
async fn deleted_subscription_marks_long_running_order() {
    let store = Store::new(false);
    let order = store.seed(
        OrderId::original(5),
        OrderStatus::Active,
        Some(Timestamp::now().plus_days(20)),
    );
    let object = json!({ "id": "sub_5", "status": "canceled", "metadata": { "source": SOURCE, "orderId": "P5-0" } });

    store.deliver("customer.subscription.deleted", object.clone()).await.unwrap();
    let again = store.deliver("customer.subscription.deleted", object).await.unwrap();

    let stored = store.ledger.find_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::AwaitingExpiry);
    assert!(matches!(again, ReconcileOutcome::CancellationRecorded { status: None, .. }));
}

// =============================================================================
// Foreign objects
// =============================================================================

#[tokio::test]
async fn foreign_objects_never_mutate_the_store() {
    let store = Store::new(true);
    let seeded = store.seed(OrderId::original(1), OrderStatus::Active, Some(Timestamp::now().plus_days(20)));
    store.add_intent("pi_f", None, None);
    store.add_subscription("sub_f", foreign());
    store.add_invoice("in_f", "sub_f");

    let deliveries = [
        ("checkout.session.completed", checkout("cs_f", "pi_f", foreign())),
        ("checkout.session.expired", checkout("cs_f", "pi_f", foreign())),
        ("customer.subscription.deleted", json!({ "id": "sub_f", "metadata": foreign() })),
        ("invoice.marked_uncollectible", json!({ "id": "in_f", "subscription": "sub_f", "amount_paid": 0 })),
    ];

    for (event_type, object) in deliveries {
        let outcome = store.deliver(event_type, object).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::ForeignSource), "{}", event_type);
    }

    assert_eq!(store.ledger.all(), vec![seeded]);
    assert_eq!(store.catalog.stock(PRODUCT), Some(10));
    assert!(store.provider.voided_invoices().is_empty());
    assert!(store.provider.deleted_subscriptions().is_empty());
}

// =============================================================================
// Fraud review
// =============================================================================

#[tokio::test]
async fn review_outcome_applies_only_to_orders_in_review() {
    let store = Store::new(false);
    store.add_intent("pi_rev", None, Some("prv_1"));
    store
        .deliver("checkout.session.completed", checkout("cs_rev", "pi_rev", ours(1)))
        .await
        .unwrap();
    assert_eq!(store.ledger.all()[0].status, OrderStatus::Review);

    let review = json!({ "id": "prv_1", "open": false, "reason": "approved", "payment_intent": "pi_rev" });
    store.deliver("review.closed", review.clone()).await.unwrap();
    assert_eq!(store.ledger.all()[0].status, OrderStatus::AwaitingProcessing);

    let refused = json!({ "id": "prv_1", "open": false, "reason": "refunded_as_fraud", "payment_intent": "pi_rev" });
    let outcome = store.deliver("review.closed", refused).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::StatusUnchanged));
    assert_eq!(store.ledger.all()[0].status, OrderStatus::AwaitingProcessing);
}
