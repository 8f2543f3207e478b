//! Ordering domain - order numbers, the order status machine, renewal chains
//! and the purchase metadata that drives fulfillment.

mod dispatch;
mod metadata;
mod order;
mod order_id;
mod status;

pub use dispatch::{resolve_dispatch_time, DispatchError, ProductPage};
pub use metadata::{has_source, keys as metadata_keys, PurchaseMetadata};
pub use order::{Order, OrderDraft, CANCELLATION_GRACE_HOURS};
pub use order_id::OrderId;
pub use status::OrderStatus;

#[cfg(test)]
pub(crate) use order::test_support;
