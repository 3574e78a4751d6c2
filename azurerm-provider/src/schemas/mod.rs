//! Azure resource schemas
//!
//! Each resource module returns an [`AzureSchemaConfig`]: the attribute
//! schema plus the ARM metadata needed to address and update the resource.

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::validate;

pub mod key_vault;
pub mod postgresql_flexible_server;
pub mod resource_group;
pub mod storage_account;
pub mod subnet;
pub mod subscription;
pub mod virtual_network;

/// Prefix of every schema's resource type
pub const SCHEMA_PREFIX: &str = "azurerm.";

/// How changes to an existing resource are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    /// PATCH with the changed configuration
    Patch,
    /// PUT the full body, re-sending preserved paths from the live object
    Put,
}

/// Which keyed locks a mutation takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    None,
    /// The resource's own `name`
    Name,
    /// The remote ID
    Id,
    /// The parent virtual network by name, then the resource's own name
    VirtualNetworkAndName,
}

/// Builds the ARM ID from the subscription and the declared attributes
pub type IdBuilder = fn(&str, &HashMap<String, Value>) -> Result<String, String>;

/// Azure schema configuration
///
/// Combines the ResourceSchema with Resource Manager metadata.
pub struct AzureSchemaConfig {
    /// Resource type in manifests (e.g., "storage_account")
    pub resource_type_name: &'static str,
    /// ARM resource type (e.g., "Microsoft.Storage/storageAccounts")
    pub arm_type: &'static str,
    pub api_version: &'static str,
    /// Whether this resource type uses tags
    pub has_tags: bool,
    /// Whether this resource type has a location
    pub has_location: bool,
    pub update_method: UpdateMethod,
    pub id_for: IdBuilder,
    pub lock: LockScope,
    /// Body paths copied from the live object on PUT updates
    pub preserve_on_put: &'static [&'static str],
    /// The resource schema with attribute definitions
    pub schema: ResourceSchema,
}

impl AzureSchemaConfig {
    /// Resource provider namespace (e.g., "Microsoft.Storage")
    pub fn namespace(&self) -> &'static str {
        self.arm_type.split('/').next().unwrap_or(self.arm_type)
    }
}

/// Returns all schema configs
pub fn configs() -> Vec<AzureSchemaConfig> {
    vec![
        resource_group::resource_group_config(),
        storage_account::storage_account_config(),
        key_vault::key_vault_config(),
        virtual_network::virtual_network_config(),
        subnet::subnet_config(),
        postgresql_flexible_server::postgresql_flexible_server_config(),
        subscription::subscription_config(),
    ]
}

/// Get the AzureSchemaConfig for a resource type
pub fn get_schema_config(resource_type: &str) -> Option<AzureSchemaConfig> {
    configs()
        .into_iter()
        .find(|c| c.resource_type_name == resource_type)
}

// =============================================================================
// Shared Attributes
// =============================================================================

pub(crate) fn enum_type(values: &[&str]) -> AttributeType {
    AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
}

pub(crate) fn name_attribute(
    type_name: &str,
    check: fn(&str) -> Result<(), String>,
) -> AttributeSchema {
    AttributeSchema::new("name", types::custom_string(type_name, check))
        .required()
        .force_new()
        .with_description("Name of the resource. Changing this forces a new resource.")
}

pub(crate) fn resource_group_name_attribute() -> AttributeSchema {
    AttributeSchema::new(
        "resource_group_name",
        types::custom_string("ResourceGroupName", validate::resource_group_name),
    )
    .required()
    .force_new()
    .with_description("Resource group containing the resource.")
}

pub(crate) fn location_attribute() -> AttributeSchema {
    AttributeSchema::new("location", types::custom_string("Location", validate::location))
        .required()
        .force_new()
        .with_description("Azure region, e.g. \"westeurope\".")
        .with_provider_name("location")
}

pub(crate) fn tags_attribute() -> AttributeSchema {
    AttributeSchema::new("tags", types::tags()).with_provider_name("tags")
}

pub(crate) fn id_attribute() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String)
        .read_only()
        .with_description("Resource Manager ID")
        .with_provider_name("id")
}

/// String attribute the ID builders require
pub(crate) fn required_str<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> Result<&'a str, String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("`{}` is required to build the resource ID", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_type_has_a_config() {
        let names: Vec<&str> = configs().iter().map(|c| c.resource_type_name).collect();
        assert_eq!(
            names,
            vec![
                "resource_group",
                "storage_account",
                "key_vault",
                "virtual_network",
                "subnet",
                "postgresql_flexible_server",
                "subscription",
            ]
        );
        for config in configs() {
            assert_eq!(
                config.schema.resource_type,
                format!("{}{}", SCHEMA_PREFIX, config.resource_type_name)
            );
            assert_eq!(config.has_tags, config.schema.attributes.contains_key("tags"));
            assert_eq!(
                config.has_location,
                config.schema.attributes.contains_key("location")
            );
        }
    }

    #[test]
    fn lookup_and_namespace() {
        let config = get_schema_config("key_vault").unwrap();
        assert_eq!(config.namespace(), "Microsoft.KeyVault");
        assert!(get_schema_config("virtual_machine").is_none());
    }

    #[test]
    fn required_str_reports_missing_key() {
        let attributes = HashMap::from([("name".to_string(), Value::from("rg1"))]);
        assert_eq!(required_str(&attributes, "name"), Ok("rg1"));
        assert_eq!(
            required_str(&attributes, "resource_group_name"),
            Err("`resource_group_name` is required to build the resource ID".to_string())
        );
    }
}
