//! Fulfillment Reconciler - Payment event reconciliation for a proxy storefront.
//!
//! Receives signed payment-provider webhooks and turns them into orders,
//! renewal chains, stock movements and operator notifications. Every event
//! may be delivered more than once, out of order, or concurrently with its
//! own redelivery; the ledger's unique constraints keep the outcome exactly
//! once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
