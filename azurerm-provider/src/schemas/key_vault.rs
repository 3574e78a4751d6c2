//! key_vault schema definition
//!
//! Microsoft.KeyVault/vaults

use std::collections::HashMap;
use std::sync::Arc;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, enum_type, id_attribute, location_attribute,
    name_attribute, required_str, resource_group_name_attribute, tags_attribute,
};
use crate::ids::{KeyVaultId, ResourceIdFormat, SubnetId, validate_id};
use crate::validate;

pub const API_VERSION: &str = "2023-07-01";

/// Retention the API assumes when none is set
pub const DEFAULT_SOFT_DELETE_RETENTION_DAYS: i64 = 90;

const MAX_ACCESS_POLICIES: usize = 1024;

pub const KEY_PERMISSIONS: &[&str] = &[
    "Backup", "Create", "Decrypt", "Delete", "Encrypt", "Get", "Import", "List", "Purge", "Recover",
    "Restore", "Sign", "UnwrapKey", "Update", "Verify", "WrapKey", "Release", "Rotate",
    "GetRotationPolicy", "SetRotationPolicy",
];

pub const SECRET_PERMISSIONS: &[&str] = &[
    "Backup", "Delete", "Get", "List", "Purge", "Recover", "Restore", "Set",
];

pub const CERTIFICATE_PERMISSIONS: &[&str] = &[
    "Backup", "Create", "Delete", "DeleteIssuers", "Get", "GetIssuers", "Import", "List",
    "ListIssuers", "ManageContacts", "ManageIssuers", "Purge", "Recover", "Restore", "SetIssuers",
    "Update",
];

pub const STORAGE_PERMISSIONS: &[&str] = &[
    "Backup", "Delete", "DeleteSAS", "Get", "GetSAS", "List", "ListSAS", "Purge", "Recover",
    "RegenerateKey", "Restore", "Set", "SetSAS", "Update",
];

/// Permission list attributes with their path under an access policy
pub const PERMISSION_ATTRIBUTES: &[(&str, &str, &[&str])] = &[
    ("key_permissions", "permissions.keys", KEY_PERMISSIONS),
    ("secret_permissions", "permissions.secrets", SECRET_PERMISSIONS),
    ("certificate_permissions", "permissions.certificates", CERTIFICATE_PERMISSIONS),
    ("storage_permissions", "permissions.storage", STORAGE_PERMISSIONS),
];

fn key_vault_id(subscription_id: &str, attributes: &HashMap<String, Value>) -> Result<String, String> {
    Ok(KeyVaultId::new(
        subscription_id,
        required_str(attributes, "resource_group_name")?,
        required_str(attributes, "name")?,
    )
    .id())
}

fn deployment_flag(name: &str, provider_name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Bool)
        .with_default(false)
        .with_description(description)
        .with_provider_name(provider_name)
}

fn uuid_field(name: &str, provider_name: &str) -> AttributeSchema {
    AttributeSchema::new(name, types::custom_string("Uuid", validate::is_uuid)).with_provider_name(provider_name)
}

fn access_policy_type() -> AttributeType {
    let mut fields = vec![
        uuid_field("tenant_id", "tenantId").required(),
        uuid_field("object_id", "objectId").required(),
        uuid_field("application_id", "applicationId"),
    ];
    for (name, path, permissions) in PERMISSION_ATTRIBUTES {
        fields.push(
            AttributeSchema::new(*name, AttributeType::List(Box::new(enum_type(permissions))))
                .with_default(Value::List(vec![]))
                .with_provider_name(*path),
        );
    }

    AttributeType::Custom {
        name: "AccessPolicies".to_string(),
        base: Box::new(types::block_list(fields)),
        validate: Arc::new(|value| match value {
            Value::List(items) if items.len() > MAX_ACCESS_POLICIES => Err(format!(
                "at most {} access policies are allowed, got {}",
                MAX_ACCESS_POLICIES,
                items.len()
            )),
            _ => Ok(()),
        }),
    }
}

fn network_acls_type() -> AttributeType {
    types::block(vec![
        AttributeSchema::new("default_action", enum_type(&["Allow", "Deny"]))
            .required()
            .with_provider_name("defaultAction"),
        AttributeSchema::new("bypass", enum_type(&["None", "AzureServices"]))
            .required()
            .with_provider_name("bypass"),
        AttributeSchema::new(
            "ip_rules",
            AttributeType::List(Box::new(types::custom_string("IpOrCidr", validate::ip_or_cidr))),
        )
        .with_default(Value::List(vec![]))
        .with_provider_name("ipRules"),
        AttributeSchema::new(
            "virtual_network_subnet_ids",
            AttributeType::List(Box::new(types::custom_string("SubnetId", validate_id::<SubnetId>))),
        )
        .with_default(Value::List(vec![]))
        .with_provider_name("virtualNetworkRules"),
    ])
}

/// Returns the schema config for key_vault
pub fn key_vault_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "key_vault",
        arm_type: "Microsoft.KeyVault/vaults",
        api_version: API_VERSION,
        has_tags: true,
        has_location: true,
        update_method: UpdateMethod::Patch,
        id_for: key_vault_id,
        lock: LockScope::Name,
        preserve_on_put: &[],
        schema: ResourceSchema::new("azurerm.key_vault")
            .with_description("An Azure Key Vault.")
            .attribute(name_attribute("KeyVaultName", validate::key_vault_name))
            .attribute(resource_group_name_attribute())
            .attribute(location_attribute())
            .attribute(
                AttributeSchema::new("tenant_id", types::custom_string("TenantId", validate::is_uuid))
                    .required()
                    .with_description("Azure Active Directory tenant used to authenticate requests to the vault.")
                    .with_provider_name("properties.tenantId"),
            )
            .attribute(
                AttributeSchema::new("sku_name", enum_type(&["standard", "premium"]))
                    .required()
                    .with_provider_name("properties.sku.name"),
            )
            .attribute(
                AttributeSchema::new("access_policy", access_policy_type())
                    .computed()
                    .with_description("Identities granted data plane permissions on the vault.")
                    .with_provider_name("properties.accessPolicies"),
            )
            .attribute(
                AttributeSchema::new("network_acls", network_acls_type())
                    .computed()
                    .with_description("Firewall of the vault.")
                    .with_provider_name("properties.networkAcls"),
            )
            .attribute(deployment_flag(
                "enabled_for_deployment",
                "properties.enabledForDeployment",
                "Allow Virtual Machines to retrieve certificates stored as secrets.",
            ))
            .attribute(deployment_flag(
                "enabled_for_disk_encryption",
                "properties.enabledForDiskEncryption",
                "Allow Disk Encryption to retrieve secrets and unwrap keys.",
            ))
            .attribute(deployment_flag(
                "enabled_for_template_deployment",
                "properties.enabledForTemplateDeployment",
                "Allow Resource Manager to retrieve secrets.",
            ))
            .attribute(
                AttributeSchema::new("enable_rbac_authorization", AttributeType::Bool)
                    .with_default(false)
                    .with_provider_name("properties.enableRbacAuthorization"),
            )
            .attribute(
                AttributeSchema::new("purge_protection_enabled", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Once enabled, purge protection can not be disabled.")
                    .with_provider_name("properties.enablePurgeProtection"),
            )
            .attribute(
                AttributeSchema::new("soft_delete_retention_days", types::int_between(7, 90))
                    .with_default(Value::Int(DEFAULT_SOFT_DELETE_RETENTION_DAYS))
                    .with_description("Days that items are retained once soft-deleted. Can not be changed once set.")
                    .with_provider_name("properties.softDeleteRetentionInDays"),
            )
            .attribute(
                AttributeSchema::new("public_network_access_enabled", AttributeType::Bool)
                    .with_default(true)
                    .with_provider_name("properties.publicNetworkAccess"),
            )
            .attribute(
                AttributeSchema::new("vault_uri", AttributeType::String)
                    .read_only()
                    .with_description("URI of the vault for key and secret operations.")
                    .with_provider_name("properties.vaultUri"),
            )
            .attribute(tags_attribute())
            .attribute(id_attribute()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), Value::from("kv-prod")),
            ("resource_group_name".to_string(), Value::from("rg1")),
            ("location".to_string(), Value::from("westeurope")),
            (
                "tenant_id".to_string(),
                Value::from("72f988bf-86f1-41af-91ab-2d7cd011db47"),
            ),
            ("sku_name".to_string(), Value::from("standard")),
        ])
    }

    #[test]
    fn builds_id() {
        assert_eq!(
            key_vault_id("0000", &attributes()).unwrap(),
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.KeyVault/vaults/kv-prod"
        );
    }

    #[test]
    fn retention_is_bounded() {
        let schema = key_vault_config().schema;
        let cases = [(6, false), (7, true), (30, true), (90, true), (91, false)];
        for (days, valid) in cases {
            let mut attrs = attributes();
            attrs.insert("soft_delete_retention_days".to_string(), Value::Int(days));
            assert_eq!(schema.validate(&attrs).is_ok(), valid, "days: {}", days);
        }
    }

    #[test]
    fn rejects_invalid_tenant_and_sku() {
        let schema = key_vault_config().schema;
        let mut attrs = attributes();
        attrs.insert("tenant_id".to_string(), Value::from("not-a-tenant"));
        attrs.insert("sku_name".to_string(), Value::from("Standard"));
        assert_eq!(schema.validate(&attrs).unwrap_err().len(), 2);
    }

    fn block(entries: &[(&str, Value)]) -> Value {
        Value::Map(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn strings(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn access_policy(object_id: &str) -> Value {
        block(&[
            ("tenant_id", Value::from("72f988bf-86f1-41af-91ab-2d7cd011db47")),
            ("object_id", Value::from(object_id)),
            ("key_permissions", strings(&["Get", "WrapKey"])),
            ("secret_permissions", strings(&["Get", "List"])),
        ])
    }

    #[test]
    fn validates_access_policies() {
        let schema = key_vault_config().schema;
        let valid = "11111111-1111-1111-1111-111111111111";

        let mut attrs = attributes();
        attrs.insert("access_policy".to_string(), Value::List(vec![access_policy(valid)]));
        assert!(schema.validate(&attrs).is_ok());

        for invalid in [
            access_policy("not-an-object-id"),
            block(&[("object_id", Value::from(valid))]),
            block(&[
                ("tenant_id", Value::from(valid)),
                ("object_id", Value::from(valid)),
                ("key_permissions", strings(&["get"])),
            ]),
            block(&[
                ("tenant_id", Value::from(valid)),
                ("object_id", Value::from(valid)),
                ("owner", Value::from("me")),
            ]),
        ] {
            attrs.insert("access_policy".to_string(), Value::List(vec![invalid.clone()]));
            assert!(schema.validate(&attrs).is_err(), "expected {} to be rejected", invalid);
        }

        let too_many = vec![access_policy(valid); MAX_ACCESS_POLICIES + 1];
        attrs.insert("access_policy".to_string(), Value::List(too_many));
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(errors[0].to_string().contains("at most 1024 access policies"), "{}", errors[0]);
    }

    #[test]
    fn validates_network_acls() {
        let schema = key_vault_config().schema;
        let subnet = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/a";

        let mut attrs = attributes();
        attrs.insert(
            "network_acls".to_string(),
            block(&[
                ("default_action", Value::from("Deny")),
                ("bypass", Value::from("AzureServices")),
                ("ip_rules", strings(&["203.0.113.0/24", "198.51.100.7"])),
                ("virtual_network_subnet_ids", strings(&[subnet])),
            ]),
        );
        assert!(schema.validate(&attrs).is_ok());

        let cases = [
            block(&[("default_action", Value::from("Deny"))]),
            block(&[("default_action", Value::from("Block")), ("bypass", Value::from("None"))]),
            block(&[
                ("default_action", Value::from("Deny")),
                ("bypass", Value::from("None")),
                ("ip_rules", strings(&["203.0.113.0/33"])),
            ]),
            block(&[
                ("default_action", Value::from("Deny")),
                ("bypass", Value::from("None")),
                ("virtual_network_subnet_ids", strings(&["/subscriptions/0000/resourceGroups/rg1"])),
            ]),
        ];
        for acls in cases {
            attrs.insert("network_acls".to_string(), acls.clone());
            assert!(schema.validate(&attrs).is_err(), "expected {} to be rejected", acls);
        }
    }
}
