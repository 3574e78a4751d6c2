//! Azure Resource Manager Provider implementation
//!
//! This module contains the main provider implementation that communicates
//! with Azure Resource Manager to manage resources. Per-type behaviour lives
//! in `hooks`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use azurerm_core::locks::{LockGuard, NamedLocks};
use azurerm_core::provider::{ProviderError, ProviderResult};
use azurerm_core::resource::{Resource, ResourceId, State, Value};
use azurerm_core::schema::TIMEOUTS_ATTRIBUTE;
use azurerm_core::timeouts::{Operation, Timeouts};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::auth::credential_for;
use crate::client::ArmClient;
use crate::config::ProviderConfig;
use crate::convert::{expand_attributes, flatten_properties, get_path, set_path};
use crate::features::UserFeatures;
use crate::hooks::{from_api_value, to_api_value};
use crate::ids::{ArmResourceId, ResourceIdFormat, SubnetId};
use crate::schemas::{AzureSchemaConfig, LockScope, UpdateMethod, get_schema_config};

/// Namespaces every subscription has registered
const BUILT_IN_NAMESPACES: &[&str] = &["Microsoft.Resources", "Microsoft.Subscription"];

/// Azure Resource Manager Provider
pub struct AzurermProvider {
    pub(crate) client: ArmClient,
    pub(crate) subscription_id: String,
    pub(crate) features: UserFeatures,
    pub(crate) locks: NamedLocks,
    timeouts: Timeouts,
    register_providers: bool,
    registered: Mutex<HashSet<&'static str>>,
}

impl AzurermProvider {
    /// Create a new AzurermProvider from a validated configuration
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("azurerm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::wrap("building HTTP client", e))?;

        let credential = credential_for(
            http.clone(),
            &config.credentials,
            config.environment,
            config.environment.token_scope(),
        );
        let client = ArmClient::new(http, &config.resource_manager_endpoint, credential)
            .with_poll_interval(config.poll_interval);

        Ok(Self::with_client(client, config.subscription_id, config.features)
            .with_provider_registration(!config.skip_provider_registration))
    }

    /// Create a provider around an existing client
    pub fn with_client(
        client: ArmClient,
        subscription_id: impl Into<String>,
        features: UserFeatures,
    ) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
            features,
            locks: NamedLocks::new(),
            timeouts: Timeouts::default(),
            register_providers: true,
            registered: Mutex::new(HashSet::new()),
        }
    }

    /// Whether resource provider namespaces are registered before first use
    pub fn with_provider_registration(mut self, enabled: bool) -> Self {
        self.register_providers = enabled;
        self
    }

    /// Default deadlines, overridable per resource
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Remote ID of a declared resource
    pub fn identifier_for_resource(&self, resource: &Resource) -> ProviderResult<String> {
        let config = config_for(&resource.id)?;
        (config.id_for)(&self.subscription_id, &resource.attributes)
            .map_err(|e| ProviderError::new(e).for_resource(resource.id.clone()))
    }

    /// Read a resource by its remote ID
    ///
    /// `timeouts` is the resource's declared `timeouts` block, if any.
    pub async fn read_resource(
        &self,
        resource_type: &str,
        name: &str,
        identifier: Option<&str>,
        timeouts: Option<&Value>,
    ) -> ProviderResult<State> {
        let id = ResourceId::new(resource_type, name);
        let config = config_for(&id)?;

        let Some(identifier) = identifier else {
            return Ok(State::not_found(id));
        };
        let timeout = self
            .declared_timeouts(timeouts)
            .map_err(|e| e.for_resource(id.clone()))?
            .get(Operation::Read);

        with_timeout(Operation::Read, timeout, async {
            let body = self
                .client
                .get(identifier, config.api_version)
                .await
                .map_err(|e| ProviderError::wrap(format!("retrieving {}", describe(&config, identifier)), e))?;
            let Some(body) = body else {
                log::debug!("{} was not found", describe(&config, identifier));
                return Ok(State::not_found(id.clone()));
            };

            let mut attributes = flatten_properties(&config.schema, &body, from_api_value);
            self.read_identity(&config, identifier, &mut attributes)?;
            self.read_special_attributes(&config, &body, &mut attributes)
                .await?;

            Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))
    }

    /// Create a resource, refusing to take over one that already exists
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let config = config_for(&id)?;

        let mut attributes = resource.attributes.clone();
        config.schema.apply_defaults(&mut attributes);
        validate_attributes(&config, &attributes).map_err(|e| e.for_resource(id.clone()))?;
        let timeout = self.timeouts_for(&attributes)?.get(Operation::Create);
        let identifier = (config.id_for)(&self.subscription_id, &attributes)
            .map_err(|e| ProviderError::new(e).for_resource(id.clone()))?;

        with_timeout(Operation::Create, timeout, async {
            self.ensure_registered(config.namespace(), timeout).await?;

            let mut guards = self.lock(&config, &identifier).await?;
            self.lock_special(&config, &attributes, &mut guards).await;

            let existing = self
                .client
                .get(&identifier, config.api_version)
                .await
                .map_err(|e| {
                    ProviderError::wrap(format!("checking for presence of existing {}", describe(&config, &identifier)), e)
                })?;
            if existing.is_some() {
                return Err(ProviderError::new(format!(
                    "a resource with the ID {:?} already exists - to be managed via this provider it needs to be imported",
                    identifier
                )));
            }

            let mut body = self.expand_body(&config, &attributes, UpdateMethod::Put);
            self.set_default_values(&config, &mut body);
            self.pre_create_operations(&config, &attributes, &mut body)
                .await?;

            log::info!("Creating {}", describe(&config, &identifier));
            self.client
                .put(&identifier, config.api_version, &body, timeout)
                .await
                .map_err(|e| ProviderError::wrap(format!("creating {}", describe(&config, &identifier)), e))?;

            self.wait_for_create(&config, &identifier, &attributes, timeout)
                .await?;
            self.post_create_operations(&config, &identifier, &attributes, timeout)
                .await?;

            self.read_resource(
                &id.resource_type,
                &id.name,
                Some(&identifier),
                attributes.get(TIMEOUTS_ATTRIBUTE),
            )
            .await
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))
    }

    /// Update a resource in place
    pub async fn update_resource(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let config = config_for(&id)?;

        let mut attributes = to.attributes.clone();
        config.schema.apply_defaults(&mut attributes);
        validate_attributes(&config, &attributes).map_err(|e| e.for_resource(id.clone()))?;
        check_update_allowed(&config, &from.attributes, &attributes)
            .map_err(|e| e.for_resource(id.clone()))?;
        let timeout = self.timeouts_for(&attributes)?.get(Operation::Update);

        with_timeout(Operation::Update, timeout, async {
            self.ensure_registered(config.namespace(), timeout).await?;
            let mut guards = self.lock(&config, identifier).await?;
            self.lock_special(&config, &attributes, &mut guards).await;

            log::info!("Updating {}", describe(&config, identifier));
            if !self
                .update_special(&config, identifier, &from.attributes, &attributes, timeout)
                .await?
            {
                self.send_update(&config, identifier, &attributes, timeout)
                    .await
                    .map_err(|e| ProviderError::wrap(format!("updating {}", describe(&config, identifier)), e))?;
            }

            self.read_resource(
                &id.resource_type,
                &id.name,
                Some(identifier),
                attributes.get(TIMEOUTS_ATTRIBUTE),
            )
            .await
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))
    }

    /// Delete a resource; one that is already gone counts as deleted
    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: Option<&Value>,
    ) -> ProviderResult<()> {
        let config = config_for(id)?;
        let timeout = self
            .declared_timeouts(timeouts)
            .map_err(|e| e.for_resource(id.clone()))?
            .get(Operation::Delete);

        with_timeout(Operation::Delete, timeout, async {
            let mut guards = self.lock(&config, identifier).await?;

            let follow_up = self
                .pre_delete_operations(&config, identifier, timeout, &mut guards)
                .await?;

            log::info!("Deleting {}", describe(&config, identifier));
            self.client
                .delete(identifier, config.api_version, timeout)
                .await
                .map_err(|e| ProviderError::wrap(format!("deleting {}", describe(&config, identifier)), e))?;

            self.post_delete_operations(&config, follow_up, timeout)
                .await
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))
    }

    // =========================================================================
    // Request Bodies
    // =========================================================================

    /// Build the request body for the given attributes
    ///
    /// PATCH bodies leave out force-new attributes, which can only change
    /// through replacement.
    pub(crate) fn expand_body(
        &self,
        config: &AzureSchemaConfig,
        attributes: &HashMap<String, Value>,
        method: UpdateMethod,
    ) -> JsonValue {
        let sent: HashMap<String, Value> = attributes
            .iter()
            .filter(|(name, _)| {
                method == UpdateMethod::Put
                    || !config
                        .schema
                        .attributes
                        .get(*name)
                        .is_some_and(|attr| attr.force_new)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut body = expand_attributes(&config.schema, &sent, to_api_value);
        self.expand_special_attributes(config, attributes, method, &mut body);
        body
    }

    async fn send_update(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        attributes: &HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<(), crate::client::ArmError> {
        match config.update_method {
            UpdateMethod::Patch => {
                let body = self.expand_body(config, attributes, UpdateMethod::Patch);
                self.client
                    .patch(identifier, config.api_version, &body, timeout)
                    .await?;
            }
            UpdateMethod::Put => {
                let mut body = self.expand_body(config, attributes, UpdateMethod::Put);
                if !config.preserve_on_put.is_empty()
                    && let Some(live) = self.client.get(identifier, config.api_version).await?
                {
                    for path in config.preserve_on_put {
                        if let Some(value) = get_path(&live, path) {
                            set_path(&mut body, path, value.clone());
                        }
                    }
                }
                self.client
                    .put(identifier, config.api_version, &body, timeout)
                    .await?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Locking, Registration and Timeouts
    // =========================================================================

    /// Take the locks a mutation of `identifier` needs
    async fn lock(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
    ) -> ProviderResult<Vec<LockGuard>> {
        let lock_type = format!("azurerm_{}", config.resource_type_name);
        let guards = match config.lock {
            LockScope::None => Vec::new(),
            LockScope::Id => vec![self.locks.by_id(identifier).await],
            LockScope::Name => {
                let id = ArmResourceId::parse(identifier)
                    .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
                let name = id.name().unwrap_or(identifier);
                vec![self.locks.by_name(name, &lock_type).await]
            }
            LockScope::VirtualNetworkAndName => {
                let id = SubnetId::parse_insensitively(identifier)
                    .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
                let network = self
                    .locks
                    .by_name(&id.virtual_network_name, "azurerm_virtual_network")
                    .await;
                let subnet = self.locks.by_name(&id.subnet_name, &lock_type).await;
                vec![network, subnet]
            }
        };
        Ok(guards)
    }

    /// Register the resource provider namespace once per provider instance
    async fn ensure_registered(&self, namespace: &'static str, timeout: Duration) -> ProviderResult<()> {
        if !self.register_providers || BUILT_IN_NAMESPACES.contains(&namespace) {
            return Ok(());
        }

        let mut registered = self.registered.lock().await;
        if registered.contains(namespace) {
            return Ok(());
        }
        self.client
            .register_provider(&self.subscription_id, namespace, timeout)
            .await
            .map_err(|e| ProviderError::wrap(format!("registering resource provider {:?}", namespace), e))?;
        registered.insert(namespace);
        Ok(())
    }

    fn timeouts_for(&self, attributes: &HashMap<String, Value>) -> ProviderResult<Timeouts> {
        Timeouts::from_attributes(self.timeouts, attributes).map_err(ProviderError::new)
    }

    fn declared_timeouts(&self, declared: Option<&Value>) -> ProviderResult<Timeouts> {
        match declared {
            Some(overrides) => self.timeouts.with_overrides(overrides).map_err(ProviderError::new),
            None => Ok(self.timeouts),
        }
    }

    /// Recover naming attributes from the remote ID
    fn read_identity(
        &self,
        config: &AzureSchemaConfig,
        identifier: &str,
        attributes: &mut HashMap<String, Value>,
    ) -> ProviderResult<()> {
        let id = ArmResourceId::parse(identifier)
            .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
        let schema = &config.schema.attributes;

        if schema.contains_key("resource_group_name")
            && let Some(group) = &id.resource_group_name
        {
            attributes.insert("resource_group_name".to_string(), Value::from(group.as_str()));
        }
        if schema.contains_key("name")
            && let Some(name) = id.name()
        {
            attributes.insert("name".to_string(), Value::from(name));
        }
        if schema.contains_key("virtual_network_name")
            && let Some((_, network)) = id
                .path
                .iter()
                .find(|(kind, _)| kind.eq_ignore_ascii_case("virtualNetworks"))
        {
            attributes.insert("virtual_network_name".to_string(), Value::from(network.as_str()));
        }
        Ok(())
    }
}

/// Get the AzureSchemaConfig for a resource
fn config_for(id: &ResourceId) -> ProviderResult<AzureSchemaConfig> {
    get_schema_config(&id.resource_type).ok_or_else(|| {
        ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
            .for_resource(id.clone())
    })
}

fn describe(config: &AzureSchemaConfig, identifier: &str) -> String {
    format!("{} {:?}", config.resource_type_name, identifier)
}

fn validate_attributes(
    config: &AzureSchemaConfig,
    attributes: &HashMap<String, Value>,
) -> ProviderResult<()> {
    config.schema.validate(attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ProviderError::new(format!("invalid configuration: {}", messages.join("; ")))
    })
}

/// Changes the API accepts but never undoes
fn check_update_allowed(
    config: &AzureSchemaConfig,
    from: &HashMap<String, Value>,
    to: &HashMap<String, Value>,
) -> ProviderResult<()> {
    if config.resource_type_name != "key_vault" {
        return Ok(());
    }

    if from.get("purge_protection_enabled") == Some(&Value::Bool(true))
        && to.get("purge_protection_enabled") == Some(&Value::Bool(false))
    {
        return Err(ProviderError::new(
            "once Purge Protection has been Enabled it's not possible to disable it",
        ));
    }
    if let (Some(Value::Int(current)), Some(Value::Int(desired))) = (
        from.get("soft_delete_retention_days"),
        to.get("soft_delete_retention_days"),
    ) && current != desired
    {
        return Err(ProviderError::new(format!(
            "once soft_delete_retention_days has been configured it cannot be modified (currently {} days)",
            current
        )));
    }
    Ok(())
}

async fn with_timeout<T>(
    operation: Operation,
    duration: Duration,
    fut: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    tokio::time::timeout(duration, fut).await.map_err(|_| {
        ProviderError::new(format!(
            "timed out after {:?} waiting for {} to complete",
            duration,
            operation.as_str()
        ))
    })?
}
