//! Resource type definitions
//!
//! One `ResourceType` per schema config; the schema itself is owned by
//! `schemas`.

use azurerm_core::provider::ResourceType;
use azurerm_core::schema::ResourceSchema;

use crate::schemas::{
    key_vault, postgresql_flexible_server, resource_group, storage_account, subnet, subscription,
    virtual_network,
};

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $config:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $config().schema
            }
        }
    };
}

define_resource_type!(ResourceGroupType, "resource_group", resource_group::resource_group_config);
define_resource_type!(StorageAccountType, "storage_account", storage_account::storage_account_config);
define_resource_type!(KeyVaultType, "key_vault", key_vault::key_vault_config);
define_resource_type!(VirtualNetworkType, "virtual_network", virtual_network::virtual_network_config);
define_resource_type!(SubnetType, "subnet", subnet::subnet_config);
define_resource_type!(
    PostgresqlFlexibleServerType,
    "postgresql_flexible_server",
    postgresql_flexible_server::postgresql_flexible_server_config
);
define_resource_type!(SubscriptionType, "subscription", subscription::subscription_config);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ResourceGroupType),
        Box::new(StorageAccountType),
        Box::new(KeyVaultType),
        Box::new(VirtualNetworkType),
        Box::new(SubnetType),
        Box::new(PostgresqlFlexibleServerType),
        Box::new(SubscriptionType),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{SCHEMA_PREFIX, configs};

    #[test]
    fn resource_types_match_schema_configs() {
        let types = resource_types();
        let configs = configs();
        assert_eq!(types.len(), configs.len());
        for (resource_type, config) in types.iter().zip(&configs) {
            assert_eq!(resource_type.name(), config.resource_type_name);
            assert_eq!(
                resource_type.schema().resource_type,
                format!("{}{}", SCHEMA_PREFIX, resource_type.name())
            );
        }
    }
}
