//! Utility functions for value normalization and conversion

/// Normalize a location value (e.g., "West Europe" -> "westeurope")
pub fn normalize_location(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

/// Convert a bool to the "Enabled"/"Disabled" strings the API uses
pub fn enabled_string(enabled: bool) -> &'static str {
    if enabled { "Enabled" } else { "Disabled" }
}

/// Parse an "Enabled"/"Disabled" string (case-insensitive)
pub fn parse_enabled(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("enabled") {
        Some(true)
    } else if s.eq_ignore_ascii_case("disabled") {
        Some(false)
    } else {
        None
    }
}

/// Split a flexible server SKU name into its API tier and SKU name
/// (e.g., "GP_Standard_D2s_v3" -> ("GeneralPurpose", "Standard_D2s_v3"))
pub fn expand_sku_tier(sku_name: &str) -> Result<(&'static str, &str), String> {
    let Some((prefix, name)) = sku_name.split_once('_') else {
        return Err(format!("sku_name {} has no sku tier", sku_name));
    };
    let tier = match prefix {
        "B" => "Burstable",
        "GP" => "GeneralPurpose",
        "MO" => "MemoryOptimized",
        other => {
            return Err(format!(
                "sku_name {} has unknown sku tier {}",
                sku_name, other
            ));
        }
    };
    Ok((tier, name))
}

/// Join an API tier and SKU name back into a flexible server SKU name
pub fn flatten_sku_tier(tier: &str, name: &str) -> Result<String, String> {
    let prefix = match tier {
        "Burstable" => "B",
        "GeneralPurpose" => "GP",
        "MemoryOptimized" => "MO",
        other => return Err(format!("sku_name has unknown sku tier {}", other)),
    };
    Ok(format!("{}_{}", prefix, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("westeurope"), "westeurope");
        assert_eq!(normalize_location("UK South"), "uksouth");
    }

    #[test]
    fn test_enabled_strings() {
        assert_eq!(enabled_string(true), "Enabled");
        assert_eq!(enabled_string(false), "Disabled");
        assert_eq!(parse_enabled("Enabled"), Some(true));
        assert_eq!(parse_enabled("disabled"), Some(false));
        assert_eq!(parse_enabled("SecuredByPerimeter"), None);
    }

    #[test]
    fn test_sku_tier() {
        assert_eq!(
            expand_sku_tier("GP_Standard_D2s_v3").unwrap(),
            ("GeneralPurpose", "Standard_D2s_v3")
        );
        assert_eq!(
            expand_sku_tier("B_Standard_B1ms").unwrap(),
            ("Burstable", "Standard_B1ms")
        );
        assert!(expand_sku_tier("X_Standard_B1ms").is_err());
        assert!(expand_sku_tier("Standard").is_err());

        assert_eq!(
            flatten_sku_tier("MemoryOptimized", "Standard_E4s_v3").unwrap(),
            "MO_Standard_E4s_v3"
        );
        assert!(flatten_sku_tier("Premium", "P1").is_err());
    }
}
