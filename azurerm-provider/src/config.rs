//! Provider configuration
//!
//! Settings come from `ARM_*` environment variables, overridden field by
//! field by the manifest's provider block.

use std::str::FromStr;
use std::time::Duration;

use azurerm_core::timeouts::parse_duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::UserFeatures;
use crate::validate::is_uuid;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{field}` must be set in the provider block or via the {env} environment variable")]
    MissingValue {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid value for `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error(
        "no credentials configured: set `access_token` (ARM_ACCESS_TOKEN) or `tenant_id`, `client_id` and `client_secret` (ARM_TENANT_ID, ARM_CLIENT_ID, ARM_CLIENT_SECRET)"
    )]
    MissingCredentials,

    #[error("unknown environment {0:?}, expected one of: public, china, usgovernment")]
    UnknownEnvironment(String),
}

/// Azure cloud the provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudEnvironment {
    #[default]
    Public,
    China,
    UsGovernment,
}

impl CloudEnvironment {
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Public => "https://management.azure.com",
            CloudEnvironment::China => "https://management.chinacloudapi.cn",
            CloudEnvironment::UsGovernment => "https://management.usgovcloudapi.net",
        }
    }

    pub fn login_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Public => "https://login.microsoftonline.com",
            CloudEnvironment::China => "https://login.chinacloudapi.cn",
            CloudEnvironment::UsGovernment => "https://login.microsoftonline.us",
        }
    }

    /// OAuth2 scope for Resource Manager tokens
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_endpoint())
    }
}

impl FromStr for CloudEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "azurepubliccloud" => Ok(CloudEnvironment::Public),
            "china" | "azurechinacloud" => Ok(CloudEnvironment::China),
            "usgovernment" | "azureusgovernmentcloud" => Ok(CloudEnvironment::UsGovernment),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Unvalidated provider settings, as written in a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderBlock {
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub environment: Option<String>,
    pub resource_manager_endpoint: Option<String>,
    pub skip_provider_registration: Option<bool>,
    /// Duration string such as "10s"
    pub poll_interval: Option<String>,
    pub features: UserFeatures,
}

impl ProviderBlock {
    /// Read the `ARM_*` variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let skip_provider_registration = match lookup("ARM_SKIP_PROVIDER_REGISTRATION") {
            Some(raw) => Some(parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "skip_provider_registration",
                message: format!("expected true or false, got {:?}", raw),
            })?),
            None => None,
        };

        Ok(Self {
            subscription_id: lookup("ARM_SUBSCRIPTION_ID"),
            tenant_id: lookup("ARM_TENANT_ID"),
            client_id: lookup("ARM_CLIENT_ID"),
            client_secret: lookup("ARM_CLIENT_SECRET"),
            access_token: lookup("ARM_ACCESS_TOKEN"),
            environment: lookup("ARM_ENVIRONMENT"),
            resource_manager_endpoint: lookup("ARM_RESOURCE_MANAGER_ENDPOINT"),
            skip_provider_registration,
            poll_interval: lookup("ARM_POLL_INTERVAL"),
            features: UserFeatures::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Fields set in `other` replace the ones in `self`; features are taken
    /// from `other` as a whole
    pub fn merge(self, other: ProviderBlock) -> Self {
        Self {
            subscription_id: other.subscription_id.or(self.subscription_id),
            tenant_id: other.tenant_id.or(self.tenant_id),
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
            access_token: other.access_token.or(self.access_token),
            environment: other.environment.or(self.environment),
            resource_manager_endpoint: other
                .resource_manager_endpoint
                .or(self.resource_manager_endpoint),
            skip_provider_registration: other
                .skip_provider_registration
                .or(self.skip_provider_registration),
            poll_interval: other.poll_interval.or(self.poll_interval),
            features: other.features,
        }
    }
}

/// How the provider authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

/// Validated provider configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub subscription_id: String,
    pub credentials: Credentials,
    pub environment: CloudEnvironment,
    pub resource_manager_endpoint: String,
    pub skip_provider_registration: bool,
    pub poll_interval: Duration,
    pub features: UserFeatures,
}

impl ProviderConfig {
    /// Environment overridden by the manifest's provider block
    pub fn load(block: ProviderBlock) -> Result<Self, ConfigError> {
        ProviderBlock::from_env()?.merge(block).try_into()
    }
}

impl TryFrom<ProviderBlock> for ProviderConfig {
    type Error = ConfigError;

    fn try_from(block: ProviderBlock) -> Result<Self, Self::Error> {
        let subscription_id = block.subscription_id.ok_or(ConfigError::MissingValue {
            field: "subscription_id",
            env: "ARM_SUBSCRIPTION_ID",
        })?;
        is_uuid(&subscription_id).map_err(|message| ConfigError::InvalidValue {
            field: "subscription_id",
            message,
        })?;

        let credentials = match (
            block.access_token,
            block.tenant_id,
            block.client_id,
            block.client_secret,
        ) {
            (Some(token), _, _, _) => Credentials::AccessToken(token),
            (None, Some(tenant_id), Some(client_id), Some(client_secret)) => {
                is_uuid(&tenant_id).map_err(|message| ConfigError::InvalidValue {
                    field: "tenant_id",
                    message,
                })?;
                is_uuid(&client_id).map_err(|message| ConfigError::InvalidValue {
                    field: "client_id",
                    message,
                })?;
                Credentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                }
            }
            _ => return Err(ConfigError::MissingCredentials),
        };

        let environment = match block.environment {
            Some(raw) => raw.parse()?,
            None => CloudEnvironment::default(),
        };

        let resource_manager_endpoint = block
            .resource_manager_endpoint
            .unwrap_or_else(|| environment.resource_manager_endpoint().to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_interval = match block.poll_interval {
            Some(raw) => parse_duration(&raw)
                .and_then(|interval| {
                    if interval.is_zero() {
                        Err(format!("poll interval '{}' must be greater than zero", raw))
                    } else {
                        Ok(interval)
                    }
                })
                .map_err(|message| ConfigError::InvalidValue {
                    field: "poll_interval",
                    message,
                })?,
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            subscription_id,
            credentials,
            environment,
            resource_manager_endpoint,
            skip_provider_registration: block.skip_provider_registration.unwrap_or(false),
            poll_interval,
            features: block.features,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
    const TENANT: &str = "00000000-0000-0000-0000-000000000002";
    const CLIENT: &str = "00000000-0000-0000-0000-000000000003";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn environment_endpoints() {
        let cases = [
            ("public", "https://management.azure.com"),
            ("AzureChinaCloud", "https://management.chinacloudapi.cn"),
            ("usgovernment", "https://management.usgovcloudapi.net"),
        ];
        for (input, endpoint) in cases {
            let env: CloudEnvironment = input.parse().unwrap();
            assert_eq!(env.resource_manager_endpoint(), endpoint);
        }
        assert_eq!(
            CloudEnvironment::Public.token_scope(),
            "https://management.azure.com/.default"
        );
        assert_eq!(
            "german".parse::<CloudEnvironment>(),
            Err(ConfigError::UnknownEnvironment("german".to_string()))
        );
    }

    #[test]
    fn client_secret_from_env() {
        let block = ProviderBlock::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
            ("ARM_TENANT_ID", TENANT),
            ("ARM_CLIENT_ID", CLIENT),
            ("ARM_CLIENT_SECRET", "s3cret"),
            ("ARM_SKIP_PROVIDER_REGISTRATION", "true"),
            ("ARM_POLL_INTERVAL", "2s"),
        ]))
        .unwrap();
        let config = ProviderConfig::try_from(block).unwrap();

        assert_eq!(config.subscription_id, SUBSCRIPTION);
        assert_eq!(
            config.credentials,
            Credentials::ClientSecret {
                tenant_id: TENANT.to_string(),
                client_id: CLIENT.to_string(),
                client_secret: "s3cret".to_string(),
            }
        );
        assert_eq!(config.resource_manager_endpoint, "https://management.azure.com");
        assert!(config.skip_provider_registration);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn manifest_overrides_env() {
        let env = ProviderBlock::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
            ("ARM_ACCESS_TOKEN", "env-token"),
        ]))
        .unwrap();
        let manifest = ProviderBlock {
            access_token: Some("manifest-token".to_string()),
            resource_manager_endpoint: Some("http://127.0.0.1:8080/".to_string()),
            ..Default::default()
        };
        let config = ProviderConfig::try_from(env.merge(manifest)).unwrap();

        assert_eq!(
            config.credentials,
            Credentials::AccessToken("manifest-token".to_string())
        );
        assert_eq!(config.resource_manager_endpoint, "http://127.0.0.1:8080");
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn validation_errors() {
        let cases: Vec<(Vec<(&str, &str)>, ConfigError)> = vec![
            (
                vec![("ARM_ACCESS_TOKEN", "t")],
                ConfigError::MissingValue {
                    field: "subscription_id",
                    env: "ARM_SUBSCRIPTION_ID",
                },
            ),
            (
                vec![("ARM_SUBSCRIPTION_ID", SUBSCRIPTION)],
                ConfigError::MissingCredentials,
            ),
            (
                vec![
                    ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
                    ("ARM_TENANT_ID", TENANT),
                    ("ARM_CLIENT_ID", CLIENT),
                ],
                ConfigError::MissingCredentials,
            ),
            (
                vec![
                    ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
                    ("ARM_ACCESS_TOKEN", "t"),
                    ("ARM_ENVIRONMENT", "mars"),
                ],
                ConfigError::UnknownEnvironment("mars".to_string()),
            ),
        ];

        for (vars, expected) in cases {
            let block = ProviderBlock::from_lookup(lookup(&vars)).unwrap();
            assert_eq!(ProviderConfig::try_from(block), Err(expected), "vars: {:?}", vars);
        }
    }

    #[test]
    fn invalid_values() {
        let block = ProviderBlock::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", "not-a-uuid"),
            ("ARM_ACCESS_TOKEN", "t"),
        ]))
        .unwrap();
        assert!(matches!(
            ProviderConfig::try_from(block),
            Err(ConfigError::InvalidValue {
                field: "subscription_id",
                ..
            })
        ));

        let result = ProviderBlock::from_lookup(lookup(&[("ARM_SKIP_PROVIDER_REGISTRATION", "maybe")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "skip_provider_registration",
                ..
            })
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        for raw in ["0s", "0m0s", "0ms"] {
            let block = ProviderBlock::from_lookup(lookup(&[
                ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
                ("ARM_ACCESS_TOKEN", "t"),
                ("ARM_POLL_INTERVAL", raw),
            ]))
            .unwrap();
            assert_eq!(
                ProviderConfig::try_from(block),
                Err(ConfigError::InvalidValue {
                    field: "poll_interval",
                    message: format!("poll interval '{}' must be greater than zero", raw),
                }),
            );
        }

        let block = ProviderBlock::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", SUBSCRIPTION),
            ("ARM_ACCESS_TOKEN", "t"),
            ("ARM_POLL_INTERVAL", "500ms"),
        ]))
        .unwrap();
        assert_eq!(
            ProviderConfig::try_from(block).unwrap().poll_interval,
            Duration::from_millis(500)
        );
    }
}
