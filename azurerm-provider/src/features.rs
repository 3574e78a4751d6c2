//! Features - Opt-in/opt-out behaviours of the provider
//!
//! Set from the `features` map of the manifest's provider block. Every field
//! is optional; unset fields keep their defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserFeatures {
    pub key_vault: KeyVaultFeatures,
    pub resource_group: ResourceGroupFeatures,
    pub subscription: SubscriptionFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyVaultFeatures {
    /// Purge soft-deleted vaults after deleting them
    pub purge_soft_delete_on_destroy: bool,
    /// Recover a soft-deleted vault of the same name instead of failing create
    pub recover_soft_deleted_key_vaults: bool,
}

impl Default for KeyVaultFeatures {
    fn default() -> Self {
        Self {
            purge_soft_delete_on_destroy: true,
            recover_soft_deleted_key_vaults: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceGroupFeatures {
    /// Refuse to delete a resource group that still contains resources
    pub prevent_deletion_if_contains_resources: bool,
}

impl Default for ResourceGroupFeatures {
    fn default() -> Self {
        Self {
            prevent_deletion_if_contains_resources: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriptionFeatures {
    /// Only remove the alias on destroy, leaving the subscription active
    pub prevent_cancellation_on_destroy: bool,
}
