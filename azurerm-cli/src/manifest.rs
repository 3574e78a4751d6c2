//! Manifest - JSON description of the desired infrastructure
//!
//! ```json
//! {
//!   "provider": { "subscription_id": "...", "features": { ... } },
//!   "resources": [
//!     { "type": "resource_group", "name": "main", "attributes": { ... } }
//!   ]
//! }
//! ```
//!
//! Resources are applied in declaration order and destroyed in reverse.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use azurerm_core::resource::{Resource, Value};
use azurerm_provider::ProviderBlock;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderBlock,
    #[serde(default)]
    pub resources: Vec<ResourceDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDeclaration {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    /// Only read the resource; it is never created, changed or deleted
    #[serde(default)]
    pub read_only: bool,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;
        manifest.check_unique_names()?;
        Ok(manifest)
    }

    fn check_unique_names(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for declaration in &self.resources {
            if declaration.name.is_empty() {
                return Err(format!(
                    "a {} resource has an empty name",
                    declaration.resource_type
                ));
            }
            if !seen.insert((&declaration.resource_type, &declaration.name)) {
                return Err(format!(
                    "{}.{} is declared more than once",
                    declaration.resource_type, declaration.name
                ));
            }
        }
        Ok(())
    }

    /// Declared resources, in declaration order
    pub fn resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|declaration| {
                Resource::new(&declaration.resource_type, &declaration.name)
                    .with_attributes(declaration.attributes.clone())
                    .with_read_only(declaration.read_only)
            })
            .collect()
    }
}
