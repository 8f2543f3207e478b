//! Static reconciler settings, fixed at startup.

/// Billing period applied when neither metadata nor a predecessor names one.
pub const DEFAULT_PERIOD_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Metadata `source` value identifying objects this storefront created.
    pub source_marker: String,
    /// Storefront site identifier customers are scoped to.
    pub site: String,
    /// Acknowledge test-mode events without applying them.
    pub require_livemode: bool,
    pub default_period_days: u32,
}

impl ReconcilerSettings {
    pub fn new(source_marker: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            source_marker: source_marker.into(),
            site: site.into(),
            require_livemode: false,
            default_period_days: DEFAULT_PERIOD_DAYS,
        }
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}
