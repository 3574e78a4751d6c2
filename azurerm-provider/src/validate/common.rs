use std::sync::LazyLock;

use azurerm_core::schema::{validate_cidr, validate_ipv4};
use regex::Regex;

use super::{Pattern, matches};

static UUID: Pattern = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").ok()
});

/// Tenant, client and subscription IDs
pub fn is_uuid(input: &str) -> Result<(), String> {
    if matches(&UUID, input) {
        Ok(())
    } else {
        Err(format!("expected a UUID, got {:?}", input))
    }
}

/// Firewall rule entry: a single IPv4 address or a CIDR block
pub fn ip_or_cidr(input: &str) -> Result<(), String> {
    if input.contains('/') {
        validate_cidr(input)
    } else {
        validate_ipv4(input)
    }
}

/// Azure region, either display form ("West Europe") or normalized ("westeurope")
pub fn location(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        return Err("location must not be empty".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(format!(
            "location {:?} may only contain letters, digits and spaces",
            input
        ));
    }
    Ok(())
}
