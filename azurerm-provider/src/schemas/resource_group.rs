//! resource_group schema definition
//!
//! Microsoft.Resources/resourceGroups

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, id_attribute, location_attribute, name_attribute,
    required_str, tags_attribute,
};
use crate::ids::{ResourceGroupId, ResourceIdFormat};
use crate::validate;

pub const API_VERSION: &str = "2022-09-01";

fn resource_group_id(subscription_id: &str, attributes: &HashMap<String, Value>) -> Result<String, String> {
    let name = required_str(attributes, "name")?;
    Ok(ResourceGroupId::new(subscription_id, name).id())
}

/// Returns the schema config for resource_group
pub fn resource_group_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "resource_group",
        arm_type: "Microsoft.Resources/resourceGroups",
        api_version: API_VERSION,
        has_tags: true,
        has_location: true,
        update_method: UpdateMethod::Put,
        id_for: resource_group_id,
        lock: LockScope::None,
        preserve_on_put: &[],
        schema: ResourceSchema::new("azurerm.resource_group")
            .with_description("A container holding related resources for an Azure solution.")
            .attribute(name_attribute("ResourceGroupName", validate::resource_group_name))
            .attribute(location_attribute())
            .attribute(
                AttributeSchema::new("managed_by", AttributeType::String)
                    .with_description("ID of the resource that manages this resource group.")
                    .with_provider_name("managedBy"),
            )
            .attribute(tags_attribute())
            .attribute(id_attribute()),
    }
}
