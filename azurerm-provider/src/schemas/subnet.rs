//! subnet schema definition
//!
//! Microsoft.Network/virtualNetworks/subnets

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    AzureSchemaConfig, LockScope, UpdateMethod, enum_type, id_attribute, name_attribute,
    required_str, resource_group_name_attribute,
};
use crate::ids::{ResourceIdFormat, SubnetId};
use crate::validate;

pub const API_VERSION: &str = "2023-11-01";

const VALID_NETWORK_POLICIES: &[&str] = &[
    "Disabled",
    "Enabled",
    "NetworkSecurityGroupEnabled",
    "RouteTableEnabled",
];

fn subnet_id(subscription_id: &str, attributes: &HashMap<String, Value>) -> Result<String, String> {
    Ok(SubnetId::new(
        subscription_id,
        required_str(attributes, "resource_group_name")?,
        required_str(attributes, "virtual_network_name")?,
        required_str(attributes, "name")?,
    )
    .id())
}

/// Returns the schema config for subnet
pub fn subnet_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "subnet",
        arm_type: "Microsoft.Network/virtualNetworks/subnets",
        api_version: API_VERSION,
        has_tags: false,
        has_location: false,
        update_method: UpdateMethod::Put,
        id_for: subnet_id,
        lock: LockScope::VirtualNetworkAndName,
        // Associations are managed as separate resources
        preserve_on_put: &[
            "properties.networkSecurityGroup",
            "properties.routeTable",
            "properties.delegations",
        ],
        schema: ResourceSchema::new("azurerm.subnet")
            .with_description("A subnet within a Virtual Network.")
            .attribute(name_attribute("SubnetName", validate::subnet_name))
            .attribute(resource_group_name_attribute())
            .attribute(
                AttributeSchema::new(
                    "virtual_network_name",
                    types::custom_string("VirtualNetworkName", validate::virtual_network_name),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("address_prefixes", AttributeType::List(Box::new(types::cidr())))
                    .required()
                    .with_provider_name("properties.addressPrefixes"),
            )
            // Sent as [{"service": "..."}]
            .attribute(
                AttributeSchema::new("service_endpoints", AttributeType::List(Box::new(AttributeType::String)))
                    .with_description("Service endpoints, e.g. \"Microsoft.Storage\".")
                    .with_provider_name("properties.serviceEndpoints"),
            )
            .attribute(
                AttributeSchema::new("private_endpoint_network_policies", enum_type(VALID_NETWORK_POLICIES))
                    .with_default("Disabled")
                    .with_provider_name("properties.privateEndpointNetworkPolicies"),
            )
            .attribute(id_attribute()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_id() {
        let attributes = HashMap::from([
            ("name".to_string(), Value::from("internal")),
            ("resource_group_name".to_string(), Value::from("rg1")),
            ("virtual_network_name".to_string(), Value::from("vnet1")),
        ]);
        assert_eq!(
            subnet_id("0000", &attributes).unwrap(),
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/internal"
        );
    }

    #[test]
    fn subnets_have_no_location_or_tags() {
        let schema = subnet_config().schema;
        let attributes = HashMap::from([
            ("name".to_string(), Value::from("internal")),
            ("resource_group_name".to_string(), Value::from("rg1")),
            ("virtual_network_name".to_string(), Value::from("vnet1")),
            (
                "address_prefixes".to_string(),
                Value::List(vec![Value::from("10.0.1.0/24")]),
            ),
            ("location".to_string(), Value::from("westeurope")),
        ]);
        let errors = schema.validate(&attributes).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Unknown attribute 'location'");
    }
}
