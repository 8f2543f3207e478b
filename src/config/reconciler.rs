//! Reconciler configuration

use serde::Deserialize;

use crate::application::ReconcilerSettings;
use crate::domain::storefront::StoreSettings;

use super::error::ValidationError;

/// Where store-wide settings are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsSourceKind {
    /// Re-read from the `store_settings` table on every delivery.
    #[default]
    Database,
    /// Fixed at startup from `cart_hold_active` and `trial_days` below.
    Static,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Metadata `source` value marking objects this storefront created
    pub source_marker: String,

    /// Site identifier customers are scoped to
    pub site: String,

    #[serde(default)]
    pub settings_source: SettingsSourceKind,

    /// Static-source only
    #[serde(default)]
    pub cart_hold_active: bool,

    /// Static-source only
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,

    /// Billing period when metadata names none
    #[serde(default = "default_period_days")]
    pub default_period_days: u32,
}

impl ReconcilerConfig {
    pub fn static_settings(&self) -> StoreSettings {
        StoreSettings {
            cart_hold_active: self.cart_hold_active,
            trial_days: self.trial_days,
        }
    }

    pub fn settings(&self, require_livemode: bool) -> ReconcilerSettings {
        ReconcilerSettings {
            source_marker: self.source_marker.clone(),
            site: self.site.clone(),
            require_livemode,
            default_period_days: self.default_period_days,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_marker.trim().is_empty() {
            return Err(ValidationError::MissingRequired("RECONCILER__SOURCE_MARKER"));
        }
        if self.site.trim().is_empty() {
            return Err(ValidationError::MissingRequired("RECONCILER__SITE"));
        }
        if self.trial_days == 0 {
            return Err(ValidationError::InvalidTrialDays);
        }
        if self.default_period_days == 0 {
            return Err(ValidationError::InvalidPeriodDays);
        }
        Ok(())
    }
}

fn default_trial_days() -> u32 {
    1
}

fn default_period_days() -> u32 {
    crate::application::handlers::reconciliation::DEFAULT_PERIOD_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            source_marker: "proxyshop".into(),
            site: "proxyshop".into(),
            settings_source: SettingsSourceKind::Static,
            cart_hold_active: true,
            trial_days: 2,
            default_period_days: 30,
        }
    }

    #[test]
    fn static_settings_mirror_config() {
        let settings = config().static_settings();
        assert!(settings.cart_hold_active);
        assert_eq!(settings.trial_days, 2);
    }

    #[test]
    fn blank_source_marker_is_rejected() {
        let c = ReconcilerConfig {
            source_marker: "  ".into(),
            ..config()
        };
        assert_eq!(
            c.validate(),
            Err(ValidationError::MissingRequired("RECONCILER__SOURCE_MARKER"))
        );
    }

    #[test]
    fn zero_trial_is_rejected() {
        let c = ReconcilerConfig {
            trial_days: 0,
            ..config()
        };
        assert_eq!(c.validate(), Err(ValidationError::InvalidTrialDays));
    }
}
