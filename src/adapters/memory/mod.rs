//! In-memory adapters for tests and local runs.

mod catalog;
mod customer_directory;
mod order_ledger;

pub use catalog::InMemoryCatalog;
pub use customer_directory::InMemoryCustomerDirectory;
pub use order_ledger::InMemoryOrderLedger;
