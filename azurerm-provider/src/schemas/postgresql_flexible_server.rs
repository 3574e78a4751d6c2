//! postgresql_flexible_server schema definition
//!
//! Microsoft.DBforPostgreSQL/flexibleServers

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, enum_type, id_attribute, location_attribute,
    name_attribute, required_str, resource_group_name_attribute, tags_attribute,
};
use crate::ids::{FlexibleServerId, ResourceIdFormat, SubnetId, validate_id};
use crate::validate;

pub const API_VERSION: &str = "2022-12-01";

const VALID_VERSIONS: &[&str] = &["11", "12", "13", "14", "15", "16"];

/// Storage sizes the service offers, in MB
const VALID_STORAGE_MB: &[i64] = &[
    32768, 65536, 131072, 262144, 524288, 1048576, 2097152, 4193280, 4194304, 8388608, 16777216,
    33553408,
];

fn flexible_server_id(
    subscription_id: &str,
    attributes: &HashMap<String, Value>,
) -> Result<String, String> {
    Ok(FlexibleServerId::new(
        subscription_id,
        required_str(attributes, "resource_group_name")?,
        required_str(attributes, "name")?,
    )
    .id())
}

const ZONES: &[&str] = &["1", "2", "3"];

fn maintenance_window_type() -> AttributeType {
    let field = |name: &str, provider_name: &str, max: i64| {
        AttributeSchema::new(name, types::int_between(0, max))
            .with_default(Value::Int(0))
            .with_provider_name(provider_name)
    };
    types::block(vec![
        field("day_of_week", "dayOfWeek", 6),
        field("start_hour", "startHour", 23),
        field("start_minute", "startMinute", 59),
    ])
}

fn high_availability_type() -> AttributeType {
    types::block(vec![
        AttributeSchema::new("mode", enum_type(&["ZoneRedundant", "SameZone"]))
            .required()
            .with_provider_name("mode"),
        AttributeSchema::new("standby_availability_zone", enum_type(ZONES))
            .with_description("Only honoured on create.")
            .with_provider_name("standbyAvailabilityZone"),
    ])
}

/// Returns the schema config for postgresql_flexible_server
pub fn postgresql_flexible_server_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "postgresql_flexible_server",
        arm_type: "Microsoft.DBforPostgreSQL/flexibleServers",
        api_version: API_VERSION,
        has_tags: true,
        has_location: true,
        update_method: UpdateMethod::Patch,
        id_for: flexible_server_id,
        lock: LockScope::Id,
        preserve_on_put: &[],
        schema: ResourceSchema::new("azurerm.postgresql_flexible_server")
            .with_description("An Azure Database for PostgreSQL Flexible Server.")
            .attribute(name_attribute("FlexibleServerName", validate::flexible_server_name))
            .attribute(resource_group_name_attribute())
            .attribute(location_attribute())
            .attribute(
                AttributeSchema::new(
                    "administrator_login",
                    types::custom_string("AdministratorLogin", validate::flexible_server_administrator_login),
                )
                .computed()
                .force_new()
                .with_provider_name("properties.administratorLogin"),
            )
            .attribute(
                AttributeSchema::new(
                    "administrator_password",
                    types::custom_string("Password", |s| validate::password_complexity(s, 8, 128)),
                )
                .sensitive()
                .with_provider_name("properties.administratorLoginPassword"),
            )
            // Expanded into sku.name and sku.tier
            .attribute(
                AttributeSchema::new(
                    "sku_name",
                    types::custom_string("FlexibleServerSkuName", validate::flexible_server_sku_name),
                )
                .required()
                .with_description("SKU in tier_size form, e.g. \"GP_Standard_D2s_v3\"."),
            )
            .attribute(
                AttributeSchema::new("version", enum_type(VALID_VERSIONS))
                    .computed()
                    .with_provider_name("properties.version"),
            )
            // Sent as storage.storageSizeGB
            .attribute(
                AttributeSchema::new("storage_mb", types::int_in_slice(VALID_STORAGE_MB))
                    .computed()
                    .with_description("Max storage allowed for the server, in MB."),
            )
            .attribute(
                AttributeSchema::new("auto_grow_enabled", AttributeType::Bool)
                    .with_default(false)
                    .with_provider_name("properties.storage.autoGrow"),
            )
            .attribute(
                AttributeSchema::new("backup_retention_days", types::int_between(7, 35))
                    .with_default(Value::Int(7))
                    .with_provider_name("properties.backup.backupRetentionDays"),
            )
            .attribute(
                AttributeSchema::new("geo_redundant_backup_enabled", AttributeType::Bool)
                    .with_default(false)
                    .force_new()
                    .with_provider_name("properties.backup.geoRedundantBackup"),
            )
            .attribute(
                AttributeSchema::new("zone", enum_type(ZONES))
                    .computed()
                    .with_provider_name("properties.availabilityZone"),
            )
            .attribute(
                AttributeSchema::new(
                    "delegated_subnet_id",
                    types::custom_string("SubnetId", validate_id::<SubnetId>),
                )
                .force_new()
                .with_description("Subnet delegated to the server for private access.")
                .with_provider_name("properties.network.delegatedSubnetResourceId"),
            )
            // Applied by a follow-up PATCH; the API ignores it on create
            .attribute(
                AttributeSchema::new("maintenance_window", maintenance_window_type())
                    .with_provider_name("properties.maintenanceWindow"),
            )
            .attribute(
                AttributeSchema::new("high_availability", high_availability_type())
                    .with_provider_name("properties.highAvailability"),
            )
            .attribute(
                AttributeSchema::new("fqdn", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.fullyQualifiedDomainName"),
            )
            .attribute(tags_attribute())
            .attribute(id_attribute()),
    }
}
