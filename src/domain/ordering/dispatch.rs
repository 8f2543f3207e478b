//! Dispatch time resolution for scheduled product drops.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::foundation::{Timestamp, ValidationError};

/// A scheduled drop page as configured by the storefront.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    pub slug: String,
    /// Wall-clock time in the business timezone.
    pub dispatch_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("product page '{0}' has no dispatch time configured")]
    Missing(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// UTC instant at which the order should be provisioned.
///
/// A page-linked purchase takes the page's dispatch time and fails if the
/// page has none. Otherwise the caller-supplied time, if any, is used.
pub fn resolve_dispatch_time(
    page: Option<&ProductPage>,
    requested: Option<Timestamp>,
) -> Result<Option<Timestamp>, DispatchError> {
    match page {
        Some(page) => {
            let local = page
                .dispatch_time
                .ok_or_else(|| DispatchError::Missing(page.slug.clone()))?;
            Ok(Some(Timestamp::from_business_local(local)?))
        }
        None => Ok(requested),
    }
}
