//! Purchase metadata carried on checkout sessions and subscriptions.
//!
//! The storefront writes a flat string map onto every provider object it
//! creates. Objects without our `source` marker belong to another system
//! sharing the provider account and are ignored rather than rejected.

use std::collections::HashMap;
use std::str::FromStr;

use super::OrderId;
use crate::domain::foundation::{CustomerId, Timestamp, ValidationError};

pub mod keys {
    pub const ORDER_ID: &str = "orderId";
    pub const SOURCE: &str = "source";
    pub const CUSTOMER_ID: &str = "customerId";
    pub const COUPON: &str = "coupon";
    pub const QUANTITY: &str = "quantity";
    pub const PERIOD: &str = "period";
    pub const PRODUCT_PAGE: &str = "productPage";
    pub const DISPATCH_TIME: &str = "dispatchTime";
    pub const REFERRAL: &str = "ref";
    pub const PRODUCT_NAME: &str = "productName";
    pub const LOCATION: &str = "location";
    pub const TRIAL: &str = "trial";
}

/// Typed view of the metadata map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseMetadata {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<CustomerId>,
    pub coupon: Option<String>,
    pub quantity: Option<u32>,
    /// Billing period in days.
    pub period: Option<u32>,
    pub product_page: Option<String>,
    pub dispatch_time: Option<Timestamp>,
    pub referral: Option<String>,
    pub product_name: Option<String>,
    pub location: Option<String>,
    pub trial: bool,
}

impl PurchaseMetadata {
    /// Parses the map when it carries `source_marker`.
    ///
    /// `Ok(None)` means the object is foreign. Present-but-malformed values
    /// are errors; absent or blank values are simply `None`.
    pub fn parse(
        map: &HashMap<String, String>,
        source_marker: &str,
    ) -> Result<Option<Self>, ValidationError> {
        if !has_source(map, source_marker) {
            return Ok(None);
        }

        Ok(Some(Self {
            order_id: parsed(map, keys::ORDER_ID)?,
            customer_id: parsed_with(map, keys::CUSTOMER_ID, |raw| {
                CustomerId::from_str(raw).map_err(|e| e.to_string())
            })?,
            coupon: text(map, keys::COUPON),
            quantity: positive(map, keys::QUANTITY)?,
            period: positive(map, keys::PERIOD)?,
            product_page: text(map, keys::PRODUCT_PAGE),
            dispatch_time: match text(map, keys::DISPATCH_TIME) {
                Some(raw) => Some(Timestamp::parse_business_local(&raw)?),
                None => None,
            },
            referral: text(map, keys::REFERRAL),
            product_name: text(map, keys::PRODUCT_NAME),
            location: text(map, keys::LOCATION),
            trial: matches!(
                text(map, keys::TRIAL).as_deref(),
                Some("true") | Some("1") | Some("yes")
            ),
        }))
    }

    /// Product and quantity whose stock was held at checkout, if both are known.
    pub fn reservation(&self) -> Option<(&str, u32)> {
        match (&self.product_name, self.quantity) {
            (Some(name), Some(quantity)) => Some((name.as_str(), quantity)),
            _ => None,
        }
    }
}

/// True when the map carries exactly our source marker.
pub fn has_source(map: &HashMap<String, String>, source_marker: &str) -> bool {
    map.get(keys::SOURCE).map(|s| s.trim()) == Some(source_marker)
}

fn text(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parsed<T>(map: &HashMap<String, String>, key: &'static str) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    text(map, key).map(|raw| raw.parse()).transpose()
}

fn parsed_with<T>(
    map: &HashMap<String, String>,
    key: &'static str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ValidationError> {
    text(map, key)
        .map(|raw| parse(&raw).map_err(|reason| ValidationError::invalid_format(key, reason)))
        .transpose()
}

fn positive(map: &HashMap<String, String>, key: &'static str) -> Result<Option<u32>, ValidationError> {
    let Some(raw) = text(map, key) else {
        return Ok(None);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| ValidationError::invalid_format(key, format!("'{}' is not an integer", raw)))?;
    if !(1..=i64::from(u32::MAX)).contains(&value) {
        return Err(ValidationError::out_of_range(key, 1, i64::from(u32::MAX), value));
    }
    Ok(Some(value as u32))
}
