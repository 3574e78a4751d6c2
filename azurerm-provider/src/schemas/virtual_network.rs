//! virtual_network schema definition
//!
//! Microsoft.Network/virtualNetworks

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types, validate_ipv4};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, id_attribute, location_attribute, name_attribute,
    required_str, resource_group_name_attribute, tags_attribute,
};
use crate::ids::{ResourceIdFormat, VirtualNetworkId};
use crate::validate;

pub const API_VERSION: &str = "2023-11-01";

fn virtual_network_id(
    subscription_id: &str,
    attributes: &HashMap<String, Value>,
) -> Result<String, String> {
    Ok(VirtualNetworkId::new(
        subscription_id,
        required_str(attributes, "resource_group_name")?,
        required_str(attributes, "name")?,
    )
    .id())
}

/// Returns the schema config for virtual_network
pub fn virtual_network_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "virtual_network",
        arm_type: "Microsoft.Network/virtualNetworks",
        api_version: API_VERSION,
        has_tags: true,
        has_location: true,
        update_method: UpdateMethod::Put,
        id_for: virtual_network_id,
        lock: LockScope::Name,
        // Subnets are managed as separate resources
        preserve_on_put: &["properties.subnets"],
        schema: ResourceSchema::new("azurerm.virtual_network")
            .with_description("An Azure Virtual Network.")
            .attribute(name_attribute("VirtualNetworkName", validate::virtual_network_name))
            .attribute(resource_group_name_attribute())
            .attribute(location_attribute())
            .attribute(
                AttributeSchema::new("address_space", AttributeType::List(Box::new(types::cidr())))
                    .required()
                    .with_description("Address spaces used by the virtual network.")
                    .with_provider_name("properties.addressSpace.addressPrefixes"),
            )
            .attribute(
                AttributeSchema::new(
                    "dns_servers",
                    AttributeType::List(Box::new(types::custom_string("IpAddress", validate_ipv4))),
                )
                .with_description("DNS servers handed out to the virtual network's hosts.")
                .with_provider_name("properties.dhcpOptions.dnsServers"),
            )
            .attribute(
                AttributeSchema::new("guid", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.resourceGuid"),
            )
            .attribute(tags_attribute())
            .attribute(id_attribute()),
    }
}
