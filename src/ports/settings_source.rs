//! SettingsSource port - store-wide flags that steer reconciliation.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::storefront::StoreSettings;

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Reads the current settings. Called once per delivery.
    async fn load(&self) -> Result<StoreSettings, DomainError>;
}

/// Settings fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct StaticSettings(pub StoreSettings);

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn load(&self) -> Result<StoreSettings, DomainError> {
        Ok(self.0)
    }
}
