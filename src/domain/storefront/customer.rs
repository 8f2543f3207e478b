//! Customers and pre-registration records.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    /// Storefront the customer belongs to; emails are unique per site.
    pub site: String,
    /// Provider customer handle (`cus_...`).
    pub provider_customer_id: Option<String>,
    pub name: Option<String>,
    pub discord_handle: Option<String>,
    pub marketing_opt_in: bool,
    pub created_at: Timestamp,
}

/// CRM fields captured before a visitor ever purchased.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialCustomer {
    pub email: String,
    pub site: String,
    pub name: Option<String>,
    pub discord_handle: Option<String>,
    pub marketing_opt_in: bool,
}

impl Customer {
    /// New customer for a first purchase, merging any pre-registration data.
    pub fn first_purchase(
        email: &str,
        site: &str,
        provider_customer_id: Option<String>,
        checkout_name: Option<String>,
        potential: Option<PotentialCustomer>,
    ) -> Self {
        let potential = potential.unwrap_or_default();
        Self {
            id: CustomerId::new(),
            email: normalize_email(email),
            site: site.to_string(),
            provider_customer_id,
            name: potential.name.or(checkout_name),
            discord_handle: potential.discord_handle,
            marketing_opt_in: potential.marketing_opt_in,
            created_at: Timestamp::now(),
        }
    }
}

/// Lower-cased, trimmed email used for lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
