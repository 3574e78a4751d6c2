//! subscription schema definition
//!
//! Microsoft.Subscription/aliases. The alias creates (or adopts) a
//! subscription; renames and cancellation go through the subscription itself.

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{AzureSchemaConfig, LockScope, UpdateMethod, enum_type, id_attribute, required_str};
use crate::ids::{ResourceIdFormat, SubscriptionAliasId};
use crate::validate;

pub const API_VERSION: &str = "2021-10-01";

/// api-version of the subscription itself (display name and state)
pub const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";

fn subscription_alias_id(
    _subscription_id: &str,
    attributes: &HashMap<String, Value>,
) -> Result<String, String> {
    Ok(SubscriptionAliasId::new(required_str(attributes, "alias")?).id())
}

/// Returns the schema config for subscription
pub fn subscription_config() -> AzureSchemaConfig {
    AzureSchemaConfig {
        resource_type_name: "subscription",
        arm_type: "Microsoft.Subscription/aliases",
        api_version: API_VERSION,
        has_tags: false,
        has_location: false,
        update_method: UpdateMethod::Patch,
        id_for: subscription_alias_id,
        lock: LockScope::Id,
        preserve_on_put: &[],
        schema: ResourceSchema::new("azurerm.subscription")
            .with_description("An Azure Subscription, managed through a subscription alias.")
            .attribute(
                AttributeSchema::new("alias", types::non_empty_string())
                    .required()
                    .force_new()
                    .with_description("Alias name of the subscription."),
            )
            .attribute(
                AttributeSchema::new(
                    "subscription_name",
                    types::custom_string("SubscriptionName", validate::subscription_name),
                )
                .required()
                .with_description("Display name of the subscription.")
                .with_provider_name("properties.displayName"),
            )
            .attribute(
                AttributeSchema::new("billing_scope_id", AttributeType::String)
                    .force_new()
                    .with_description("Billing account scope the subscription is created under.")
                    .with_provider_name("properties.billingScope"),
            )
            .attribute(
                AttributeSchema::new("workload", enum_type(&["Production", "DevTest"]))
                    .with_default("Production")
                    .force_new()
                    .with_provider_name("properties.workload"),
            )
            .attribute(
                AttributeSchema::new("subscription_id", types::custom_string("SubscriptionId", validate::is_uuid))
                    .computed()
                    .force_new()
                    .with_description("ID of an existing subscription to manage instead of creating one.")
                    .with_provider_name("properties.subscriptionId"),
            )
            .attribute(id_attribute()),
    }
}
