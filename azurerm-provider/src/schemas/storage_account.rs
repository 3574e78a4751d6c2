//! storage_account schema definition
//!
//! Microsoft.Storage/storageAccounts

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, enum_type, id_attribute, location_attribute,
    name_attribute, required_str, resource_group_name_attribute, tags_attribute,
};
use crate::ids::{ResourceIdFormat, StorageAccountId};
use crate::validate;

pub const API_VERSION: &str = "2023-01-01";

const VALID_ACCOUNT_KINDS: &[&str] = &[
    "BlobStorage",
    "BlockBlobStorage",
    "FileStorage",
    "Storage",
    "StorageV2",
];
const VALID_ACCOUNT_TIERS: &[&str] = &["Standard", "Premium"];
const VALID_REPLICATION_TYPES: &[&str] = &["LRS", "GRS", "RAGRS", "ZRS", "GZRS", "RAGZRS"];
const VALID_ACCESS_TIERS: &[&str] = &["Hot", "Cool"];
const VALID_TLS_VERSIONS: &[&str] = &["TLS1_0", "TLS1_1", "TLS1_2"];

fn storage_account_id(
    subscription_id: &str,
    attributes: &HashMap<String, Value>,
) -> Result<String, String> {
    Ok(StorageAccountId::new(
        subscription_id,
        required_str(attributes, "resource_group_name")?,
        required_str(attributes, "name")?,
    )
    .id())
}

/// Returns the schema config for storage_account
pub fn storage_account_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "storage_account",
        arm_type: "Microsoft.Storage/storageAccounts",
        api_version: API_VERSION,
        has_tags: true,
        has_location: true,
        update_method: UpdateMethod::Patch,
        id_for: storage_account_id,
        lock: LockScope::Name,
        preserve_on_put: &[],
        schema: ResourceSchema::new("azurerm.storage_account")
            .with_description("An Azure Storage Account.")
            .attribute(name_attribute("StorageAccountName", validate::storage_account_name))
            .attribute(resource_group_name_attribute())
            .attribute(location_attribute())
            .attribute(
                AttributeSchema::new("account_kind", enum_type(VALID_ACCOUNT_KINDS))
                    .with_default("StorageV2")
                    .with_description("Kind of account.")
                    .with_provider_name("kind"),
            )
            // account_tier and account_replication_type are joined into sku.name
            .attribute(
                AttributeSchema::new("account_tier", enum_type(VALID_ACCOUNT_TIERS))
                    .required()
                    .force_new()
                    .with_description("Tier of the account. Changing this forces a new resource."),
            )
            .attribute(
                AttributeSchema::new("account_replication_type", enum_type(VALID_REPLICATION_TYPES))
                    .required()
                    .with_description("Replication of the account's data."),
            )
            .attribute(
                AttributeSchema::new("access_tier", enum_type(VALID_ACCESS_TIERS))
                    .computed()
                    .with_description("Access tier for BlobStorage, FileStorage and StorageV2 accounts.")
                    .with_provider_name("properties.accessTier"),
            )
            .attribute(
                AttributeSchema::new("https_traffic_only_enabled", AttributeType::Bool)
                    .with_default(true)
                    .with_provider_name("properties.supportsHttpsTrafficOnly"),
            )
            .attribute(
                AttributeSchema::new("min_tls_version", enum_type(VALID_TLS_VERSIONS))
                    .with_default("TLS1_2")
                    .with_provider_name("properties.minimumTlsVersion"),
            )
            .attribute(
                AttributeSchema::new("allow_nested_items_to_be_public", AttributeType::Bool)
                    .with_default(true)
                    .with_description("Allow or disallow nested items within this account to opt into being public.")
                    .with_provider_name("properties.allowBlobPublicAccess"),
            )
            .attribute(
                AttributeSchema::new("public_network_access_enabled", AttributeType::Bool)
                    .with_default(true)
                    .with_provider_name("properties.publicNetworkAccess"),
            )
            .attribute(
                AttributeSchema::new("primary_location", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.primaryLocation"),
            )
            .attribute(
                AttributeSchema::new("primary_blob_endpoint", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.primaryEndpoints.blob"),
            )
            .attribute(
                AttributeSchema::new("primary_file_endpoint", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.primaryEndpoints.file"),
            )
            .attribute(tags_attribute())
            .attribute(id_attribute()),
    }
}
