//! Order creation for settled payments.
//!
//! Numbering is optimistic: read the highest number, insert the next one, and
//! renumber when the ledger reports the id was taken concurrently. Side
//! effects (stock, coupons, subscription metadata) run only after an insert
//! wins, so a redelivered payment never repeats them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{CustomerId, Timestamp, ValidationError};
use crate::domain::ordering::{
    metadata_keys, resolve_dispatch_time, Order, OrderDraft, OrderId, OrderStatus, PurchaseMetadata,
};
use crate::domain::payments::ReconcileError;
use crate::domain::storefront::{Customer, StoreSettings};
use crate::ports::{Catalog, CustomerDirectory, InsertResult, OrderLedger, PaymentProvider};

use super::inventory::InventoryCoordinator;
use super::settings::ReconcilerSettings;

/// Insert attempts before giving up on order-number contention.
pub const MAX_NUMBERING_ATTEMPTS: u32 = 3;

/// Upper bound on forward pointers followed when locating a chain head.
const MAX_CHAIN_WALK: usize = 1024;

/// A first purchase: one-off checkout, trial start, or first subscription cycle.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub payment_id: String,
    pub metadata: PurchaseMetadata,
    pub email: Option<String>,
    pub checkout_name: Option<String>,
    pub provider_customer_id: Option<String>,
    pub total: i64,
    pub payment_status: String,
    /// Days of service bought.
    pub length: u32,
    pub under_review: bool,
    /// Subscription to point at the new order, when there is one.
    pub subscription_id: Option<String>,
}

/// A paid subscription cycle following an existing order.
#[derive(Debug, Clone)]
pub struct RenewalPayment {
    pub payment_id: String,
    /// Order the subscription metadata points at.
    pub predecessor: OrderId,
    pub subscription_id: String,
    pub total: i64,
    pub payment_status: String,
    pub length: Option<u32>,
    pub under_review: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fulfillment {
    Created(Order),
    /// The unique payment constraint rejected the insert.
    AlreadyApplied,
}

pub struct OrderFulfiller {
    ledger: Arc<dyn OrderLedger>,
    customers: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn Catalog>,
    provider: Arc<dyn PaymentProvider>,
    inventory: InventoryCoordinator,
    settings: Arc<ReconcilerSettings>,
}

impl OrderFulfiller {
    pub fn new(
        ledger: Arc<dyn OrderLedger>,
        customers: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn Catalog>,
        provider: Arc<dyn PaymentProvider>,
        settings: Arc<ReconcilerSettings>,
    ) -> Self {
        Self {
            inventory: InventoryCoordinator::new(catalog.clone()),
            ledger,
            customers,
            catalog,
            provider,
            settings,
        }
    }

    /// Creates the original order `P<n>-0` for a first purchase.
    pub async fn fulfill_purchase(
        &self,
        store: &StoreSettings,
        purchase: Purchase,
    ) -> Result<Fulfillment, ReconcileError> {
        let metadata = &purchase.metadata;
        let product_name = metadata
            .product_name
            .clone()
            .ok_or_else(|| ValidationError::empty_field(metadata_keys::PRODUCT_NAME))?;
        let product = self
            .catalog
            .find_product(&product_name)
            .await?
            .ok_or_else(|| ReconcileError::ProductNotFound(product_name.clone()))?;

        let page = match &metadata.product_page {
            Some(slug) => Some(
                self.catalog
                    .find_product_page(slug)
                    .await?
                    .ok_or_else(|| ReconcileError::ProductPageNotFound(slug.clone()))?,
            ),
            None => None,
        };
        let dispatch_time = resolve_dispatch_time(page.as_ref(), metadata.dispatch_time)?;
        let customer_id = self.resolve_customer(&purchase).await?;

        let draft = OrderDraft {
            payment_id: purchase.payment_id.clone(),
            customer_id,
            product_name: product.name.clone(),
            status: OrderStatus::initial(purchase.under_review, product.preorder),
            payment_status: purchase.payment_status.clone(),
            quantity: metadata.quantity.unwrap_or(1),
            length: purchase.length,
            total: purchase.total,
            location: metadata.location.clone(),
            dispatch_time,
            note: metadata.referral.clone(),
            coupon_name: metadata.coupon.clone(),
            ecom_order_id: purchase.subscription_id.clone(),
        };

        for attempt in 1..=MAX_NUMBERING_ATTEMPTS {
            let highest = self.ledger.highest_original_sequence().await?;
            let order = Order::from_draft(OrderId::next_original(highest), draft.clone(), None, Timestamp::now());

            match self.ledger.insert(&order).await? {
                InsertResult::Inserted => {
                    tracing::info!(
                        order_id = %order.order_id,
                        payment_id = %order.payment_id,
                        status = %order.status,
                        "Order created"
                    );
                    let reserved = metadata.reservation().map(|(_, quantity)| quantity);
                    self.after_first_purchase(store, &order, reserved, purchase.subscription_id.as_deref())
                        .await;
                    return Ok(Fulfillment::Created(order));
                }
                InsertResult::DuplicatePayment => return Ok(Fulfillment::AlreadyApplied),
                InsertResult::DuplicateOrderId => {
                    tracing::warn!(attempt, order_id = %order.order_id, "Order number taken, renumbering");
                }
            }
        }
        Err(ReconcileError::NumberingExhausted(MAX_NUMBERING_ATTEMPTS))
    }

    /// Creates `P<n>-0-R<k>` after the current head of the predecessor's chain.
    pub async fn fulfill_renewal(&self, renewal: RenewalPayment) -> Result<Fulfillment, ReconcileError> {
        let mut head = self.chain_head(&renewal.predecessor).await?;
        if head.order_id != renewal.predecessor {
            tracing::warn!(
                named = %renewal.predecessor,
                head = %head.order_id,
                "Subscription points behind chain head"
            );
        }

        for attempt in 1..=MAX_NUMBERING_ATTEMPTS {
            let highest = self.ledger.highest_renewal(head.order_id.sequence()).await?;
            let order_id = head.order_id.next_renewal(highest);
            let order = Order::from_draft(
                order_id,
                renewal_draft(&head, &renewal, self.settings.default_period_days),
                Some(head.order_id),
                Timestamp::now(),
            );

            match self.ledger.insert(&order).await? {
                InsertResult::Inserted => {
                    tracing::info!(
                        order_id = %order.order_id,
                        predecessor = %head.order_id,
                        payment_id = %order.payment_id,
                        "Renewal created"
                    );
                    self.point_subscription_at(&renewal.subscription_id, &order.order_id)
                        .await;
                    return Ok(Fulfillment::Created(order));
                }
                InsertResult::DuplicatePayment => return Ok(Fulfillment::AlreadyApplied),
                InsertResult::DuplicateOrderId => {
                    tracing::warn!(attempt, order_id = %order_id, "Renewal number taken, renumbering");
                    head = self.chain_head(&head.order_id).await?;
                }
            }
        }
        Err(ReconcileError::NumberingExhausted(MAX_NUMBERING_ATTEMPTS))
    }

    /// Metadata customer id, then email within the site, then a new customer
    /// merged with any pre-registration.
    async fn resolve_customer(&self, purchase: &Purchase) -> Result<CustomerId, ReconcileError> {
        if let Some(id) = &purchase.metadata.customer_id {
            if let Some(customer) = self.customers.find_by_id(id).await? {
                return Ok(customer.id);
            }
            tracing::warn!(customer_id = %id, "Metadata customer not found, falling back to email");
        }

        let email = purchase
            .email
            .as_deref()
            .ok_or_else(|| ReconcileError::CustomerUnresolved(format!("no email for {}", purchase.payment_id)))?;
        let site = &self.settings.site;

        if let Some(customer) = self.customers.find_by_email(email, site).await? {
            return Ok(customer.id);
        }

        let potential = self.customers.find_potential(email, site).await?;
        let customer = Customer::first_purchase(
            email,
            site,
            purchase.provider_customer_id.clone(),
            purchase.checkout_name.clone(),
            potential,
        );
        let stored = self.customers.create(&customer).await?;
        tracing::info!(customer_id = %stored.id, "Customer created");
        Ok(stored.id)
    }

    /// Follows `next_chain` from `from` to the newest link.
    async fn chain_head(&self, from: &OrderId) -> Result<Order, ReconcileError> {
        let mut order = self
            .ledger
            .find_by_order_id(from)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(from.to_string()))?;

        for _ in 0..MAX_CHAIN_WALK {
            let Some(next) = order.next_chain else {
                return Ok(order);
            };
            match self.ledger.find_by_order_id(&next).await? {
                Some(successor) => order = successor,
                None => {
                    tracing::warn!(order_id = %order.order_id, next = %next, "Dangling chain pointer");
                    return Ok(order);
                }
            }
        }
        Ok(order)
    }

    /// `reserved` is the quantity the checkout held; purchases without
    /// inventory metadata never touch stock.
    async fn after_first_purchase(
        &self,
        store: &StoreSettings,
        order: &Order,
        reserved: Option<u32>,
        subscription_id: Option<&str>,
    ) {
        if let Some(quantity) = reserved {
            if let Err(err) = self.inventory.commit(store, &order.product_name, quantity).await {
                tracing::error!(order_id = %order.order_id, error = %err, "Stock decrement failed");
            }
        }

        if let Some(coupon) = &order.coupon_name {
            if let Err(err) = self.catalog.increment_coupon_usage(coupon).await {
                tracing::error!(order_id = %order.order_id, coupon = %coupon, error = %err, "Coupon increment failed");
            }
        }

        if let Some(subscription_id) = subscription_id {
            self.point_subscription_at(subscription_id, &order.order_id).await;
        }
    }

    /// Records the newest order on the subscription so the next cycle chains
    /// after it.
    async fn point_subscription_at(&self, subscription_id: &str, order_id: &OrderId) {
        let metadata = HashMap::from([(metadata_keys::ORDER_ID.to_string(), order_id.to_string())]);
        match self
            .provider
            .update_subscription_metadata(subscription_id, &metadata)
            .await
        {
            Ok(()) => tracing::debug!(subscription_id, order_id = %order_id, "Subscription metadata updated"),
            Err(err) => tracing::error!(
                subscription_id,
                order_id = %order_id,
                error = %err,
                "Subscription metadata update failed"
            ),
        }
    }
}

fn renewal_draft(head: &Order, renewal: &RenewalPayment, default_length: u32) -> OrderDraft {
    OrderDraft {
        payment_id: renewal.payment_id.clone(),
        customer_id: head.customer_id,
        product_name: head.product_name.clone(),
        status: OrderStatus::initial(renewal.under_review, false),
        payment_status: renewal.payment_status.clone(),
        quantity: head.quantity,
        length: renewal.length.unwrap_or(if head.length > 0 { head.length } else { default_length }),
        total: renewal.total,
        location: head.location.clone(),
        dispatch_time: None,
        note: head.note.clone(),
        coupon_name: head.coupon_name.clone(),
        ecom_order_id: Some(renewal.subscription_id.clone()),
    }
}
