//! Domain layer - Pure business logic with no infrastructure dependencies.

pub mod foundation;
pub mod ordering;
pub mod payments;
pub mod storefront;
