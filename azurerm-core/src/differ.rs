//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in the manifest with the current state
//! fetched from the Provider, and generates the list of required Effects.

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeType, ResourceSchema, TIMEOUTS_ATTRIBUTE};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> needs replacement
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Without a schema every declared attribute is compared verbatim.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|schema| {
        changed.iter().any(|name| {
            schema
                .attributes
                .get(name)
                .is_some_and(|attr| attr.force_new)
        })
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') || key == TIMEOUTS_ATTRIBUTE {
            continue;
        }

        let attr = schema.and_then(|s| s.attributes.get(key));
        if attr.is_some_and(|a| a.read_only) {
            continue;
        }

        match current.get(key) {
            Some(current_value)
                if attr.map_or(current_value == desired_value, |a| {
                    matches_declared(&a.attr_type, desired_value, current_value)
                }) => {}
            // Write-only secrets are never echoed back by the API
            None if attr.is_some_and(|a| a.sensitive) => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Compare a declared value with the current one
///
/// Block fields left out of the declaration accept whatever the remote reports.
fn matches_declared(attr_type: &AttributeType, desired: &Value, current: &Value) -> bool {
    match (attr_type, desired, current) {
        (AttributeType::Block(fields), Value::Map(declared), Value::Map(remote)) => {
            declared.iter().all(|(key, value)| {
                let Some(field) = fields.iter().find(|f| &f.name == key) else {
                    return false;
                };
                remote
                    .get(key)
                    .is_some_and(|remote| matches_declared(&field.attr_type, value, remote))
            })
        }
        (AttributeType::List(inner), Value::List(declared), Value::List(remote)) => {
            declared.len() == remote.len()
                && declared
                    .iter()
                    .zip(remote)
                    .all(|(d, r)| matches_declared(inner, d, r))
        }
        (AttributeType::Custom { base, .. }, desired, current) => matches_declared(base, desired, current),
        _ => desired == current,
    }
}

/// Compute Diff for multiple resources and generate a Plan
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        if resource.read_only {
            plan.add(Effect::Read(resource.clone()));
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &current, schemas.get(&resource.id.resource_type)) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    plan
}

/// Plan deleting every declared resource that exists, in reverse declaration order
///
/// Read-only resources are never deleted.
pub fn destroy_plan(desired: &[Resource], current_states: &HashMap<ResourceId, State>) -> Plan {
    let mut plan = Plan::new();
    for resource in desired.iter().rev().filter(|r| !r.read_only) {
        let Some(state) = current_states.get(&resource.id) else {
            continue;
        };
        if let (true, Some(identifier)) = (state.exists, &state.identifier) {
            plan.add(Effect::Delete {
                id: resource.id.clone(),
                identifier: identifier.clone(),
                timeouts: resource.timeouts().cloned(),
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn vault_schema() -> ResourceSchema {
        ResourceSchema::new("key_vault")
            .attribute(AttributeSchema::new("location", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("sku_name", AttributeType::String))
            .attribute(AttributeSchema::new("vault_uri", AttributeType::String).read_only())
            .attribute(AttributeSchema::new("password", AttributeType::String).sensitive())
    }

    fn existing(attrs: &[(&str, &str)]) -> State {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        State::existing(ResourceId::new("key_vault", "main"), attrs)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("key_vault", "main");
        let current = State::not_found(ResourceId::new("key_vault", "main"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("key_vault", "main").with_attribute("location", "westeurope");
        let current = existing(&[("location", "westeurope"), ("vault_uri", "https://x")]);

        let result = diff(&desired, &current, Some(&vault_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_in_place_attribute_changes() {
        let desired = Resource::new("key_vault", "main")
            .with_attribute("location", "westeurope")
            .with_attribute("sku_name", "premium");
        let current = existing(&[("location", "westeurope"), ("sku_name", "standard")]);

        match diff(&desired, &current, Some(&vault_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["sku_name".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_when_force_new_attribute_changes() {
        let desired = Resource::new("key_vault", "main")
            .with_attribute("location", "northeurope")
            .with_attribute("sku_name", "premium");
        let current = existing(&[("location", "westeurope"), ("sku_name", "standard")]);

        match diff(&desired, &current, Some(&vault_schema())) {
            Diff::Replace {
                changed_attributes, ..
            } => assert_eq!(
                changed_attributes,
                vec!["location".to_string(), "sku_name".to_string()]
            ),
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    fn block(entries: &[(&str, &str)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn diff_compares_only_declared_block_fields() {
        let ha = AttributeType::Block(vec![
            AttributeSchema::new("mode", AttributeType::String).required(),
            AttributeSchema::new("standby_availability_zone", AttributeType::String),
        ]);
        let schema = ResourceSchema::new("server")
            .attribute(AttributeSchema::new("high_availability", ha))
            .attribute(AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String))));
        let mut current = State::existing(ResourceId::new("server", "main"), HashMap::new());
        current.attributes.insert(
            "high_availability".to_string(),
            block(&[("mode", "ZoneRedundant"), ("standby_availability_zone", "2")]),
        );
        current
            .attributes
            .insert("tags".to_string(), block(&[("env", "prod"), ("owner", "db")]));

        let desired = Resource::new("server", "main")
            .with_attribute("high_availability", block(&[("mode", "ZoneRedundant")]));
        assert!(matches!(diff(&desired, &current, Some(&schema)), Diff::NoChange(_)));

        let desired = Resource::new("server", "main")
            .with_attribute("high_availability", block(&[("mode", "SameZone")]));
        assert!(matches!(diff(&desired, &current, Some(&schema)), Diff::Update { .. }));

        // Plain maps still compare in full, so removed tags are noticed
        let desired = Resource::new("server", "main").with_attribute("tags", block(&[("env", "prod")]));
        match diff(&desired, &current, Some(&schema)) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["tags".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_ignores_unreturned_sensitive_and_timeouts() {
        let mut timeouts = HashMap::new();
        timeouts.insert("create".to_string(), Value::from("1h"));
        let desired = Resource::new("key_vault", "main")
            .with_attribute("location", "westeurope")
            .with_attribute("password", "s3cr3t!Pass")
            .with_attribute(TIMEOUTS_ATTRIBUTE, Value::Map(timeouts));
        let current = existing(&[("location", "westeurope")]);

        let result = diff(&desired, &current, Some(&vault_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("key_vault", "new"),
            Resource::new("key_vault", "main").with_attribute("sku_name", "premium"),
        ];

        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("key_vault", "main"),
            existing(&[("sku_name", "standard")]),
        );
        let mut schemas = HashMap::new();
        schemas.insert("key_vault".to_string(), vault_schema());

        let plan = create_plan(&resources, &current_states, &schemas);

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
    }

    #[test]
    fn destroy_plan_reverses_order_and_skips_missing() {
        let timeouts = Value::Map(HashMap::from([("delete".to_string(), Value::from("2h"))]));
        let resources = vec![
            Resource::new("resource_group", "rg"),
            Resource::new("key_vault", "gone"),
            Resource::new("resource_group", "shared").with_read_only(true),
            Resource::new("key_vault", "kv").with_attribute("timeouts", timeouts.clone()),
        ];

        let mut current_states = HashMap::new();
        for (id, identifier) in [
            (ResourceId::new("resource_group", "rg"), "/subscriptions/0000/resourceGroups/rg"),
            (
                ResourceId::new("resource_group", "shared"),
                "/subscriptions/0000/resourceGroups/shared",
            ),
            (
                ResourceId::new("key_vault", "kv"),
                "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv",
            ),
        ] {
            current_states.insert(
                id.clone(),
                State::existing(id, HashMap::new()).with_identifier(identifier),
            );
        }
        let gone = ResourceId::new("key_vault", "gone");
        current_states.insert(gone.clone(), State::not_found(gone));

        let plan = destroy_plan(&resources, &current_states);

        let names: Vec<&str> = plan
            .effects()
            .iter()
            .map(|e| e.resource_id().name.as_str())
            .collect();
        assert_eq!(names, vec!["kv", "rg"]);
        assert!(matches!(
            &plan.effects()[0],
            Effect::Delete { timeouts: Some(t), .. } if *t == timeouts
        ));
        assert!(matches!(
            &plan.effects()[1],
            Effect::Delete { timeouts: None, .. }
        ));
    }
}
