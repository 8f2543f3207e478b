//! Storefront domain - customers, catalog entries and store settings.

mod customer;
mod product;

pub use customer::{normalize_email, Customer, PotentialCustomer};
pub use product::{Product, StoreSettings};
