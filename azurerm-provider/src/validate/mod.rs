//! Input validators for resource attributes
//!
//! Each validator checks a string and returns a human readable error; the
//! resource schemas wrap them with `types::custom_string`.

mod common;
mod credentials;
mod names;

pub use common::{ip_or_cidr, is_uuid, location};
pub use credentials::{flexible_server_administrator_login, password_complexity};
pub use names::{
    flexible_server_name, flexible_server_sku_name, key_vault_name, resource_group_name,
    storage_account_name, subnet_name, subscription_name, virtual_network_name,
};

use std::sync::LazyLock;

use regex::Regex;

/// Compiled pattern; `None` only if the pattern itself is invalid
pub(crate) type Pattern = LazyLock<Option<Regex>>;

pub(crate) fn matches(pattern: &Pattern, input: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(input))
}
