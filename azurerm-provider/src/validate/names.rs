use std::sync::LazyLock;

use regex::Regex;

use super::{Pattern, matches};

static STORAGE_ACCOUNT_NAME: Pattern =
    LazyLock::new(|| Regex::new(r"\A([a-z0-9]{3,24})\z").ok());
static KEY_VAULT_NAME: Pattern = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]{3,24}$").ok());
static RESOURCE_GROUP_NAME: Pattern = LazyLock::new(|| Regex::new(r"^[-\w._()]+$").ok());
static VIRTUAL_NETWORK_NAME: Pattern =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9_.-]{0,62}[a-zA-Z0-9_])?$").ok());
static SUBNET_NAME: Pattern =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9_.-]{0,78}[a-zA-Z0-9_])?$").ok());
static FLEXIBLE_SERVER_NAME: Pattern =
    LazyLock::new(|| Regex::new(r"^[0-9a-z][-0-9a-z]{1,61}[0-9a-z]$").ok());
static FLEXIBLE_SERVER_SKU_NAME: Pattern =
    LazyLock::new(|| Regex::new(r"^(B|GP|MO)_Standard_[A-Z][A-Za-z0-9]*(_v[0-9]+)?$").ok());

pub fn storage_account_name(input: &str) -> Result<(), String> {
    if !matches(&STORAGE_ACCOUNT_NAME, input) {
        return Err(format!(
            "name ({:?}) can only consist of lowercase letters and numbers, and must be between 3 and 24 characters long",
            input
        ));
    }
    Ok(())
}

pub fn key_vault_name(input: &str) -> Result<(), String> {
    if !matches(&KEY_VAULT_NAME, input) {
        return Err(format!(
            "{:?} may only contain alphanumeric characters and dashes and must be between 3-24 chars",
            input
        ));
    }
    if !input.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(format!("{:?} must start with a letter", input));
    }
    if !input.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(format!("{:?} must end with a letter or digit", input));
    }
    if input.contains("--") {
        return Err(format!(
            "{:?} must not contain any consecutive hyphens",
            input
        ));
    }
    Ok(())
}

pub fn resource_group_name(input: &str) -> Result<(), String> {
    if input.is_empty() {
        return Err("resource group name cannot be blank".to_string());
    }
    if input.chars().count() > 90 {
        return Err(format!(
            "{:?} may not exceed 90 characters in length",
            input
        ));
    }
    if input.ends_with('.') {
        return Err(format!("{:?} may not end with a period", input));
    }
    if !matches(&RESOURCE_GROUP_NAME, input) {
        return Err(format!(
            "{:?} may only contain alphanumeric characters, dash, underscores, parentheses and periods",
            input
        ));
    }
    Ok(())
}

pub fn virtual_network_name(input: &str) -> Result<(), String> {
    if !matches(&VIRTUAL_NETWORK_NAME, input) {
        return Err(format!(
            "{:?} must be between 1 and 64 characters, begin with a letter or number, end with a letter, number or underscore, and may contain only letters, numbers, underscores, periods, or hyphens",
            input
        ));
    }
    Ok(())
}

pub fn subnet_name(input: &str) -> Result<(), String> {
    if !matches(&SUBNET_NAME, input) {
        return Err(format!(
            "{:?} must be between 1 and 80 characters, begin with a letter or number, end with a letter, number or underscore, and may contain only letters, numbers, underscores, periods, or hyphens",
            input
        ));
    }
    Ok(())
}

pub fn flexible_server_name(input: &str) -> Result<(), String> {
    if !matches(&FLEXIBLE_SERVER_NAME, input) {
        return Err(format!(
            "{:?} must be 3 - 63 characters long, contain only lowercase letters, numbers and hyphens, and must not start or end with a hyphen",
            input
        ));
    }
    Ok(())
}

/// Flexible server SKU in `tier_size` form, e.g. `B_Standard_B1ms`
pub fn flexible_server_sku_name(input: &str) -> Result<(), String> {
    if !matches(&FLEXIBLE_SERVER_SKU_NAME, input) {
        return Err(format!(
            "{:?} must be a tier prefix (B, GP or MO) followed by a size, such as B_Standard_B1ms or GP_Standard_D2s_v3",
            input
        ));
    }
    Ok(())
}

/// Display name of a subscription
pub fn subscription_name(input: &str) -> Result<(), String> {
    let length = input.chars().count();
    if !(1..=64).contains(&length) {
        return Err(format!(
            "subscription name must be between 1 and 64 characters in length, got {}",
            length
        ));
    }
    if let Some(c) = input.chars().find(|c| "<>;|".contains(*c)) {
        return Err(format!(
            "subscription name must not contain {:?}, got {:?}",
            c, input
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(validator: fn(&str) -> Result<(), String>, cases: &[(&str, bool)]) {
        for (input, valid) in cases {
            assert_eq!(
                validator(input).is_ok(),
                *valid,
                "input {:?}: {:?}",
                input,
                validator(input)
            );
        }
    }

    #[test]
    fn storage_account_names() {
        check(
            storage_account_name,
            &[
                ("ab", false),
                ("abc", true),
                ("abcdefghijklmnopqrstuvwx", true),
                ("abcdefghijklmnopqrstuvwxy", false),
                ("ab-c", false),
                ("abC", false),
                ("abc123", true),
                ("abc\n", false),
            ],
        );
    }

    #[test]
    fn storage_account_name_message() {
        assert_eq!(
            storage_account_name("Invalid_Name").unwrap_err(),
            "name (\"Invalid_Name\") can only consist of lowercase letters and numbers, and must be between 3 and 24 characters long"
        );
    }

    #[test]
    fn key_vault_names() {
        check(
            key_vault_name,
            &[
                ("hi", false),
                ("hello", true),
                ("hello-world", true),
                ("hello-world-21", true),
                ("hello_world_21", false),
                ("Hello-World", true),
                ("20202020", false),
                ("ABC123!@£", false),
                ("abcdefghijklmnopqrstuvwx", true),
                ("abcdefghijklmnopqrstuvwxy", false),
                ("hello--world", false),
                ("hello-", false),
                ("-hello", false),
            ],
        );
    }

    #[test]
    fn resource_group_names() {
        let too_long = "a".repeat(91);
        let longest = "a".repeat(90);
        check(
            resource_group_name,
            &[
                ("", false),
                ("hello", true),
                ("Hello", true),
                ("hello-world", true),
                ("Hello_World", true),
                ("HelloWithNumbers12345", true),
                ("(Did)You(Know)That(Brackets)Are(Allowed)", true),
                ("EndingWithAPeriod.", false),
                ("NotEndingWithAPeriod.Hello", true),
                ("HelloWorld!", false),
                ("Hello World", false),
                ("Ünicode", true),
                (longest.as_str(), true),
                (too_long.as_str(), false),
            ],
        );
    }

    #[test]
    fn virtual_network_names() {
        check(
            virtual_network_name,
            &[
                ("v", true),
                ("vnet-1", true),
                ("vnet.internal_", true),
                ("-vnet", false),
                ("vnet-", false),
                ("vnet.", false),
                ("v net", false),
                (&"a".repeat(64), true),
                (&"a".repeat(65), false),
            ],
        );
    }

    #[test]
    fn subnet_names() {
        check(
            subnet_name,
            &[
                ("internal", true),
                ("GatewaySubnet", true),
                ("_subnet", false),
                (&"a".repeat(80), true),
                (&"a".repeat(81), false),
            ],
        );
    }

    #[test]
    fn flexible_server_names() {
        check(
            flexible_server_name,
            &[
                ("ab", false),
                ("abc", true),
                ("a-b-c", true),
                ("-abc", false),
                ("abc-", false),
                ("ABC", false),
                ("a_bc", false),
                (&"a".repeat(63), true),
                (&"a".repeat(64), false),
            ],
        );
    }

    #[test]
    fn flexible_server_sku_names() {
        check(
            flexible_server_sku_name,
            &[
                ("B_Standard_B1ms", true),
                ("GP_Standard_D2s_v3", true),
                ("MO_Standard_E4s_v3", true),
                ("Standard_B1ms", false),
                ("X_Standard_B1ms", false),
                ("GP_Standard_", false),
            ],
        );
    }

    #[test]
    fn subscription_names() {
        check(
            subscription_name,
            &[
                ("Production", true),
                ("Dev / Test", true),
                ("", false),
                ("a<b", false),
                ("pipe|name", false),
                (&"a".repeat(65), false),
            ],
        );
    }
}
