//! Azurerm Provider
//!
//! Azure Resource Manager Provider implementation.
//!
//! ## Module Structure
//!
//! - `auth` - Access tokens for Resource Manager
//! - `client` - REST client with long-running operation polling
//! - `config` - Provider configuration from the environment and manifest
//! - `convert` - Mapping between attributes and JSON bodies
//! - `features` - Opt-in/opt-out provider behaviours
//! - `hooks` - Per-resource-type special cases
//! - `ids` - Resource ID parsing and formatting
//! - `provider` - AzurermProvider implementation
//! - `resources` - Resource type definitions
//! - `schemas` - Resource schemas
//! - `utils` - Helper functions for value normalization
//! - `validate` - Naming and credential rules

pub mod auth;
pub mod client;
pub mod config;
pub mod convert;
pub mod features;
mod hooks;
pub mod ids;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod utils;
pub mod validate;

// Re-export main types
pub use config::{ProviderBlock, ProviderConfig};
pub use features::UserFeatures;
pub use provider::AzurermProvider;
pub use utils::normalize_location;

use azurerm_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use azurerm_core::resource::{Resource, ResourceId, State, Value};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzurermProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn identifier_for(&self, resource: &Resource) -> ProviderResult<Option<String>> {
        self.identifier_for_resource(resource).map(Some)
    }

    fn normalize(&self, resource: &mut Resource) {
        if let Some(Value::String(location)) = resource.attributes.get_mut("location") {
            *location = normalize_location(location);
        }
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        timeouts: Option<&Value>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        let timeouts = timeouts.cloned();
        Box::pin(async move {
            self.read_resource(&id.resource_type, &id.name, identifier.as_deref(), timeouts.as_ref())
                .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(id, &identifier, from, to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: Option<&Value>,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let timeouts = timeouts.cloned();
        Box::pin(async move { self.delete_resource(&id, &identifier, timeouts.as_ref()).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::client::ArmClient;

    fn provider() -> Box<dyn Provider> {
        let client = ArmClient::new(
            reqwest::Client::new(),
            "http://localhost",
            Box::new(StaticToken::new("token")),
        );
        Box::new(AzurermProvider::with_client(
            client,
            "00000000-0000-0000-0000-000000000000",
            UserFeatures::default(),
        ))
    }

    #[test]
    fn normalizes_declared_location() {
        let provider = provider();
        let mut resource = Resource::new("resource_group", "main")
            .with_attribute("name", "rg1")
            .with_attribute("location", "West Europe");
        provider.normalize(&mut resource);
        assert_eq!(resource.get_str("location"), Some("westeurope"));
        assert_eq!(provider.name(), "azurerm");
    }

    #[test]
    fn identifier_for_builds_arm_id() {
        let resource = Resource::new("resource_group", "main").with_attribute("name", "rg1");
        assert_eq!(
            provider().identifier_for(&resource).unwrap().as_deref(),
            Some("/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1")
        );
    }

    #[test]
    fn unknown_resource_type_is_an_error() {
        let err = provider()
            .identifier_for(&Resource::new("virtual_machine", "vm"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[virtual_machine.vm] Unknown resource type: virtual_machine"
        );
    }
}
