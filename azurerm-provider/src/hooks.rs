//! Per-resource-type behaviour that does not follow the schema mapping
//!
//! Value conversions keyed by attribute name, and the special cases of each
//! CRUD operation keyed by resource type.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use azurerm_core::locks::LockGuard;
use azurerm_core::poll::{RefreshResult, StateChangeConf};
use azurerm_core::provider::{ProviderError, ProviderResult};
use azurerm_core::resource::Value;
use serde_json::{Value as JsonValue, json};

use crate::convert::{get_path, set_path};
use crate::ids::{DeletedVaultId, KeyVaultId, ResourceIdFormat, SubnetId, SubscriptionId};
use crate::provider::AzurermProvider;
use crate::schemas::{AzureSchemaConfig, UpdateMethod, key_vault, required_str, subscription};
use crate::utils::{enabled_string, expand_sku_tier, flatten_sku_tier, normalize_location, parse_enabled};

/// Wait before the first data plane probe of a new Key Vault
const DATA_PLANE_DELAY: Duration = Duration::from_secs(30);
/// Consecutive successful probes before a Key Vault counts as reachable
const DATA_PLANE_CHECKS: usize = 10;

/// Follow-up work once the DELETE went through
pub(crate) enum DeleteFollowUp {
    None,
    PurgeKeyVault(DeletedVaultId),
}

// =============================================================================
// Value Conversion
// =============================================================================

/// Convert an attribute value into its API form; `None` keeps the plain conversion
pub(crate) fn to_api_value(name: &str, value: &Value) -> Option<JsonValue> {
    match (name, value) {
        (
            "public_network_access_enabled" | "geo_redundant_backup_enabled" | "auto_grow_enabled",
            Value::Bool(b),
        ) => Some(json!(enabled_string(*b))),
        ("location", Value::String(s)) => Some(json!(normalize_location(s))),
        // [{"service": "Microsoft.Storage"}]
        ("service_endpoints", Value::List(items)) => Some(wrap_items(items, "service")),
        // [{"value": "203.0.113.0/24"}]
        ("ip_rules", Value::List(items)) => Some(wrap_items(items, "value")),
        ("virtual_network_subnet_ids", Value::List(items)) => Some(wrap_items(items, "id")),
        _ => None,
    }
}

fn wrap_items(items: &[Value], key: &str) -> JsonValue {
    JsonValue::Array(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(|item| {
                let mut object = serde_json::Map::new();
                object.insert(key.to_string(), json!(item));
                JsonValue::Object(object)
            })
            .collect(),
    )
}

fn unwrap_items(json: &JsonValue, key: &str) -> Option<Vec<String>> {
    json.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.get(key).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .collect()
    })
}

/// Virtual networks of the subnets a Key Vault firewall allows, sorted and deduplicated
fn acl_virtual_networks(attributes: &HashMap<String, Value>) -> BTreeSet<String> {
    let Some(Value::Map(acls)) = attributes.get("network_acls") else {
        return BTreeSet::new();
    };
    let Some(Value::List(subnets)) = acls.get("virtual_network_subnet_ids") else {
        return BTreeSet::new();
    };
    subnets
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|id| SubnetId::parse_insensitively(id).ok())
        .map(|subnet| subnet.virtual_network_name)
        .collect()
}

fn string_list(items: Vec<String>) -> Value {
    Value::List(items.into_iter().map(Value::String).collect())
}

/// The API lowercases permission names; match them back to their declared form
fn canonical_permissions(json: &JsonValue, known: &[&str]) -> Option<Value> {
    json.as_array().map(|items| {
        Value::List(
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|permission| {
                    let canonical = known
                        .iter()
                        .find(|k| k.eq_ignore_ascii_case(permission))
                        .map_or(permission, |k| *k);
                    Value::from(canonical)
                })
                .collect(),
        )
    })
}

/// Convert an API value back into an attribute value; `None` keeps the plain conversion
pub(crate) fn from_api_value(name: &str, json: &JsonValue) -> Option<Value> {
    match name {
        "public_network_access_enabled" | "geo_redundant_backup_enabled" | "auto_grow_enabled" => {
            json.as_str().and_then(parse_enabled).map(Value::Bool)
        }
        "location" => json.as_str().map(|s| Value::String(normalize_location(s))),
        "service_endpoints" => unwrap_items(json, "service").map(string_list),
        "ip_rules" => unwrap_items(json, "value").map(string_list),
        "virtual_network_subnet_ids" => unwrap_items(json, "id").map(|ids| {
            Value::List(
                ids.into_iter()
                    .map(|id| match SubnetId::parse_insensitively(&id) {
                        Ok(subnet) => Value::String(subnet.id()),
                        Err(_) => Value::String(id),
                    })
                    .collect(),
            )
        }),
        _ => key_vault::PERMISSION_ATTRIBUTES
            .iter()
            .find(|(attribute, _, _)| *attribute == name)
            .and_then(|(_, _, known)| canonical_permissions(json, known)),
    }
}

impl AzurermProvider {
    // =========================================================================
    // Read
    // =========================================================================

    /// Handle attributes that don't follow the standard mapping
    pub(crate) async fn read_special_attributes(
        &self,
        config: &AzureSchemaConfig,
        body: &JsonValue,
        attributes: &mut HashMap<String, Value>,
    ) -> ProviderResult<()> {
        match config.resource_type_name {
            "storage_account" => {
                // "Standard_GRS" -> tier "Standard", replication "GRS"
                if let Some(sku) = get_path(body, "sku.name").and_then(|v| v.as_str())
                    && let Some((tier, replication)) = sku.split_once('_')
                {
                    attributes.insert("account_tier".to_string(), Value::from(tier));
                    attributes.insert("account_replication_type".to_string(), Value::from(replication));
                }
            }
            "postgresql_flexible_server" => {
                if let Some(tier) = get_path(body, "sku.tier").and_then(|v| v.as_str())
                    && let Some(name) = get_path(body, "sku.name").and_then(|v| v.as_str())
                {
                    let sku_name = flatten_sku_tier(tier, name).map_err(ProviderError::new)?;
                    attributes.insert("sku_name".to_string(), Value::String(sku_name));
                }
                if let Some(gb) = get_path(body, "properties.storage.storageSizeGB").and_then(|v| v.as_i64()) {
                    attributes.insert("storage_mb".to_string(), Value::Int(gb * 1024));
                }
                // Switched-off blocks read back as unset
                if get_path(body, "properties.maintenanceWindow.customWindow").and_then(|v| v.as_str()) != Some("Enabled") {
                    attributes.remove("maintenance_window");
                }
                if get_path(body, "properties.highAvailability.mode")
                    .and_then(|v| v.as_str())
                    .is_none_or(|mode| mode == "Disabled")
                {
                    attributes.remove("high_availability");
                }
            }
            "subscription" => {
                if let Some(alias) = body.get("name").and_then(|v| v.as_str()) {
                    attributes.insert("alias".to_string(), Value::from(alias));
                }
                // The alias keeps the name it was created with; renames only show on the subscription
                if let Some(subscription_id) = attributes.get("subscription_id").and_then(Value::as_str) {
                    let path = SubscriptionId::new(subscription_id).id();
                    let live = self
                        .client
                        .get(&path, subscription::SUBSCRIPTIONS_API_VERSION)
                        .await
                        .map_err(|e| ProviderError::wrap(format!("retrieving subscription {:?}", subscription_id), e))?;
                    if let Some(name) = live
                        .as_ref()
                        .and_then(|s| s.get("displayName"))
                        .and_then(|v| v.as_str())
                    {
                        attributes.insert("subscription_name".to_string(), Value::from(name));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    // =========================================================================
    // Request Bodies
    // =========================================================================

    /// Handle attributes that are sent somewhere other than their own path
    pub(crate) fn expand_special_attributes(
        &self,
        config: &AzureSchemaConfig,
        attributes: &HashMap<String, Value>,
        method: UpdateMethod,
        body: &mut JsonValue,
    ) {
        match config.resource_type_name {
            "storage_account" => {
                if let (Some(tier), Some(replication)) = (
                    attributes.get("account_tier").and_then(Value::as_str),
                    attributes.get("account_replication_type").and_then(Value::as_str),
                ) {
                    set_path(body, "sku.name", json!(format!("{}_{}", tier, replication)));
                }
            }
            "postgresql_flexible_server" => {
                if let Some(sku_name) = attributes.get("sku_name").and_then(Value::as_str)
                    && let Ok((tier, name)) = expand_sku_tier(sku_name)
                {
                    set_path(body, "sku", json!({ "name": name, "tier": tier }));
                }
                if let Some(mb) = attributes.get("storage_mb").and_then(Value::as_int) {
                    set_path(body, "properties.storage.storageSizeGB", json!(mb / 1024));
                }
                if attributes.contains_key("maintenance_window") {
                    set_path(body, "properties.maintenanceWindow.customWindow", json!("Enabled"));
                }
                match method {
                    UpdateMethod::Put if !attributes.contains_key("high_availability") => {
                        set_path(body, "properties.highAvailability.mode", json!("Disabled"));
                    }
                    // The standby zone can't change once the server exists
                    UpdateMethod::Patch => {
                        if let Some(ha) = body
                            .pointer_mut("/properties/highAvailability")
                            .and_then(|ha| ha.as_object_mut())
                        {
                            ha.remove("standbyAvailabilityZone");
                        }
                    }
                    UpdateMethod::Put => {}
                }
            }
            "key_vault" => {
                if get_path(body, "properties.sku").is_some() {
                    set_path(body, "properties.sku.family", json!("A"));
                }
                // The API refuses an explicit false
                if attributes.get("purge_protection_enabled") == Some(&Value::Bool(false))
                    && let Some(properties) = body.get_mut("properties").and_then(|p| p.as_object_mut())
                {
                    properties.remove("enablePurgeProtection");
                }
            }
            _ => {}
        }
    }

    /// Set default values for create
    pub(crate) fn set_default_values(&self, config: &AzureSchemaConfig, body: &mut JsonValue) {
        if config.resource_type_name == "key_vault" && get_path(body, "properties.accessPolicies").is_none() {
            set_path(body, "properties.accessPolicies", json!([]));
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Locks beyond the resource's own lock scope
    pub(crate) async fn lock_special(
        &self,
        config: &AzureSchemaConfig,
        attributes: &HashMap<String, Value>,
        guards: &mut Vec<LockGuard>,
    ) {
        match config.resource_type_name {
            "subscription" => {
                if let Some(subscription_id) = attributes.get("subscription_id").and_then(Value::as_str) {
                    guards.push(self.locks.by_id(&SubscriptionId::new(subscription_id).id()).await);
                }
            }
            // Firewall rules reference subnets; their networks must not change underneath
            "key_vault" => {
                for network in acl_virtual_networks(attributes) {
                    guards.push(self.locks.by_name(&network, "azurerm_virtual_network").await);
                }
            }
            _ => {}
        }
    }

    /// Handle operations needed before the PUT (e.g., recover a soft-deleted Key Vault)
    pub(crate) async fn pre_create_operations(
        &self,
        config: &AzureSchemaConfig,
        attributes: &HashMap<String, Value>,
        body: &mut JsonValue,
    ) -> ProviderResult<()> {
        match config.resource_type_name {
            "key_vault" => self.recover_soft_deleted_key_vault(attributes, body).await,
            "postgresql_flexible_server" => {
                if let Some(properties) = body.get_mut("properties").and_then(|p| p.as_object_mut()) {
                    properties.remove("maintenanceWindow");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn recover_soft_deleted_key_vault(
        &self,
        attributes: &HashMap<String, Value>,
        body: &mut JsonValue,
    ) -> ProviderResult<()> {
        let name = required_str(attributes, "name").map_err(ProviderError::new)?;
        let location = normalize_location(required_str(attributes, "location").map_err(ProviderError::new)?);
        let deleted = DeletedVaultId::new(&self.subscription_id, &location, name);

        let soft_deleted = self
            .client
            .get(&deleted.id(), key_vault::API_VERSION)
            .await
            .map_err(|e| ProviderError::wrap(format!("retrieving deleted Key Vault {:?}", deleted.id()), e))?;
        if soft_deleted.is_none() {
            return Ok(());
        }

        if !self.features.key_vault.recover_soft_deleted_key_vaults {
            return Err(ProviderError::new(format!(
                "an existing soft-deleted Key Vault exists with the name {:?} in the location {:?}, \
                 however automatically recovering this Key Vault has been disabled via the \"features\" block. \
                 Either purge it or enable `recover_soft_deleted_key_vaults`",
                name, location
            )));
        }

        log::info!("Recovering soft-deleted Key Vault {:?} in {:?}", name, location);
        set_path(body, "properties.createMode", json!("recover"));
        Ok(())
    }

    /// Settings the API only accepts once the resource exists
    pub(crate) async fn post_create_operations(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        attributes: &HashMap<String, Value>,
        timeout: Duration,
    ) -> ProviderResult<()> {
        if config.resource_type_name != "postgresql_flexible_server" {
            return Ok(());
        }
        let Some(window) = attributes.get("maintenance_window") else {
            return Ok(());
        };

        let window = HashMap::from([("maintenance_window".to_string(), window.clone())]);
        let body = self.expand_body(config, &window, UpdateMethod::Patch);
        log::info!("Setting the maintenance window of {:?}", identifier);
        self.client
            .patch(identifier, config.api_version, &body, timeout)
            .await
            .map_err(|e| ProviderError::wrap(format!("setting the maintenance window of {:?}", identifier), e))?;
        Ok(())
    }

    /// Wait until a newly created resource is usable
    pub(crate) async fn wait_for_create(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        attributes: &HashMap<String, Value>,
        timeout: Duration,
    ) -> ProviderResult<()> {
        let api_version = config.api_version;
        let poll_interval = self.client.poll_interval();

        match config.resource_type_name {
            "storage_account" => {
                StateChangeConf::new(&["Creating", "ResolvingDNS"], &["Succeeded"], timeout)
                    .with_poll_interval(poll_interval)
                    .wait_for_state(|| self.refresh_state(identifier, api_version, "properties.provisioningState"))
                    .await?;
            }
            "postgresql_flexible_server" => {
                StateChangeConf::new(&["Provisioning", "Starting", "Updating"], &["Ready"], timeout)
                    .with_poll_interval(poll_interval)
                    .wait_for_state(|| self.refresh_state(identifier, api_version, "properties.state"))
                    .await?;
            }
            "subscription" => {
                StateChangeConf::new(&["Accepted", "Running"], &["Succeeded"], timeout)
                    .with_poll_interval(poll_interval)
                    .wait_for_state(|| self.refresh_state(identifier, api_version, "properties.provisioningState"))
                    .await?;
            }
            "key_vault" => {
                // Only reachable from here when public network access is on
                if attributes.get("public_network_access_enabled") != Some(&Value::Bool(true)) {
                    return Ok(());
                }
                let live = self.client.get(identifier, api_version).await?;
                let Some(uri) = live
                    .as_ref()
                    .and_then(|body| get_path(body, "properties.vaultUri"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                else {
                    return Ok(());
                };

                let client = &self.client;
                let uri = uri.as_str();
                wait_for_data_plane(uri, timeout, poll_interval, move || client.probe(uri)).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Current value of a state field of the object at `identifier`
    async fn refresh_state(&self, identifier: &str, api_version: &str, field: &str) -> RefreshResult<JsonValue> {
        let body = self.client.get(identifier, api_version).await?;
        Ok(body.map(|body| {
            let state = get_path(&body, field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            (body, state)
        }))
    }


    // =========================================================================
    // Update
    // =========================================================================

    /// Updates that don't go through PATCH/PUT of the resource itself
    ///
    /// Returns whether the update was fully handled here.
    pub(crate) async fn update_special(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        from: &HashMap<String, Value>,
        to: &HashMap<String, Value>,
        timeout: Duration,
    ) -> ProviderResult<bool> {
        if config.resource_type_name != "subscription" {
            return Ok(false);
        }

        let Some(name) = to.get("subscription_name").and_then(Value::as_str) else {
            return Ok(true);
        };
        if from.get("subscription_name").and_then(Value::as_str) == Some(name) {
            return Ok(true);
        }

        let subscription_id = match from.get("subscription_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.alias_subscription_id(config, identifier).await?.ok_or_else(|| {
                ProviderError::new(format!("subscription alias {:?} has no subscription", identifier))
            })?,
        };

        log::info!("Renaming subscription {} to {:?}", subscription_id, name);
        let path = format!(
            "{}/providers/Microsoft.Subscription/rename",
            SubscriptionId::new(&subscription_id).id()
        );
        self.client
            .post(&path, subscription::API_VERSION, Some(&json!({ "subscriptionName": name })), timeout)
            .await
            .map_err(|e| ProviderError::wrap(format!("renaming subscription {:?}", subscription_id), e))?;
        Ok(true)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Handle operations needed before the DELETE
    pub(crate) async fn pre_delete_operations(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        timeout: Duration,
        guards: &mut Vec<LockGuard>,
    ) -> ProviderResult<DeleteFollowUp> {
        match config.resource_type_name {
            "resource_group" => {
                if self.features.resource_group.prevent_deletion_if_contains_resources {
                    self.ensure_resource_group_empty(config, identifier).await?;
                }
                Ok(DeleteFollowUp::None)
            }
            "key_vault" => self.key_vault_follow_up(config, identifier).await,
            "subscription" => {
                let Some(subscription_id) = self.alias_subscription_id(config, identifier).await? else {
                    return Ok(DeleteFollowUp::None);
                };
                let subscription = SubscriptionId::new(&subscription_id).id();
                guards.push(self.locks.by_id(&subscription).await);

                if self.features.subscription.prevent_cancellation_on_destroy {
                    log::info!("Leaving subscription {} active, only removing its alias", subscription_id);
                } else {
                    self.cancel_subscription(&subscription, timeout).await?;
                }
                Ok(DeleteFollowUp::None)
            }
            _ => Ok(DeleteFollowUp::None),
        }
    }

    /// Handle operations needed after the DELETE (e.g., purge a Key Vault)
    pub(crate) async fn post_delete_operations(
        &self,
        _config: &AzureSchemaConfig,
        follow_up: DeleteFollowUp,
        timeout: Duration,
    ) -> ProviderResult<()> {
        match follow_up {
            DeleteFollowUp::None => Ok(()),
            DeleteFollowUp::PurgeKeyVault(deleted) => {
                log::info!("Purging {}", deleted.id());
                self.client
                    .post(&format!("{}/purge", deleted.id()), key_vault::API_VERSION, None, timeout)
                    .await
                    .map_err(|e| ProviderError::wrap(format!("purging deleted Key Vault {:?}", deleted.id()), e))?;
                Ok(())
            }
        }
    }

    async fn ensure_resource_group_empty(&self, config: &AzureSchemaConfig, identifier: &str) -> ProviderResult<()> {
        let resources = self
            .client
            .list(&format!("{}/resources", identifier), config.api_version)
            .await
            .map_err(|e| ProviderError::wrap(format!("listing resources in {:?}", identifier), e))?;
        if resources.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = resources
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
            .collect();
        Err(ProviderError::new(format!(
            "deleting resource group {:?}: the resource group still contains {} resources:\n\n{}\n\n\
             delete them first, or turn off `prevent_deletion_if_contains_resources` in the features block",
            identifier,
            resources.len(),
            ids.join("\n")
        )))
    }

    /// Whether the Key Vault should be purged once deleted
    async fn key_vault_follow_up(&self, config: &AzureSchemaConfig, identifier: &str) -> ProviderResult<DeleteFollowUp> {
        if !self.features.key_vault.purge_soft_delete_on_destroy {
            return Ok(DeleteFollowUp::None);
        }

        let Some(live) = self
            .client
            .get(identifier, config.api_version)
            .await
            .map_err(|e| ProviderError::wrap(format!("retrieving Key Vault {:?}", identifier), e))?
        else {
            return Ok(DeleteFollowUp::None);
        };

        let purge_protected = get_path(&live, "properties.enablePurgeProtection")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if purge_protected {
            log::info!("{} has purge protection enabled, it will not be purged", identifier);
            return Ok(DeleteFollowUp::None);
        }

        let vault = KeyVaultId::parse_insensitively(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
        let location = live
            .get("location")
            .and_then(|v| v.as_str())
            .map(normalize_location)
            .ok_or_else(|| ProviderError::new(format!("Key Vault {:?} has no location", identifier)))?;

        Ok(DeleteFollowUp::PurgeKeyVault(DeletedVaultId::new(
            vault.subscription_id,
            location,
            vault.vault_name,
        )))
    }

    async fn alias_subscription_id(&self, config: &AzureSchemaConfig, identifier: &str) -> ProviderResult<Option<String>> {
        let alias = self
            .client
            .get(identifier, config.api_version)
            .await
            .map_err(|e| ProviderError::wrap(format!("retrieving subscription alias {:?}", identifier), e))?;
        Ok(alias
            .as_ref()
            .and_then(|a| get_path(a, "properties.subscriptionId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Cancel a subscription and wait until it is disabled
    async fn cancel_subscription(&self, subscription: &str, timeout: Duration) -> ProviderResult<()> {
        log::info!("Cancelling subscription {}", subscription);
        self.client
            .post(
                &format!("{}/providers/Microsoft.Subscription/cancel", subscription),
                subscription::API_VERSION,
                None,
                timeout,
            )
            .await
            .map_err(|e| ProviderError::wrap(format!("cancelling subscription {:?}", subscription), e))?;

        StateChangeConf::new(&["Enabled", "Warned", "PastDue"], &["Disabled"], timeout)
            .with_poll_interval(self.client.poll_interval())
            .wait_for_state(|| self.refresh_subscription_state(subscription))
            .await
            .map_err(|e| ProviderError::wrap(format!("waiting for subscription {:?} to be cancelled", subscription), e))?;
        Ok(())
    }

    async fn refresh_subscription_state(&self, subscription: &str) -> RefreshResult<()> {
        let body = self
            .client
            .get(subscription, subscription::SUBSCRIPTIONS_API_VERSION)
            .await?;
        Ok(body.map(|body| {
            let state = body
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            ((), state)
        }))
    }
}

/// Wait until `probe` reached the data plane of a new Key Vault often enough in a row
async fn wait_for_data_plane<F, Fut>(
    uri: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut probe: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    log::debug!("Waiting for the data plane of {} to become available", uri);
    StateChangeConf::new(&["pending"], &["available"], timeout)
        .with_delay(DATA_PLANE_DELAY)
        .with_poll_interval(poll_interval)
        .with_continuous_target_occurence(DATA_PLANE_CHECKS)
        .wait_for_state(|| {
            let reachable = probe();
            async move {
                let state = if reachable.await { "available" } else { "pending" };
                Ok::<_, ProviderError>(Some(((), state.to_string())))
            }
        })
        .await
        .map_err(|e| ProviderError::wrap(format!("waiting for Key Vault {:?} to become available", uri), e))?;
    Ok(())
}
