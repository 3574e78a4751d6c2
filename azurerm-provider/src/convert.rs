//! Conversion between attribute values and ARM JSON bodies
//!
//! Attributes are mapped to dotted paths in the body (`provider_name` in the
//! schema, e.g. `properties.sku.name`). Fields of nested blocks map to paths
//! inside the block's own object.

use std::collections::HashMap;

use azurerm_core::resource::Value;
use azurerm_core::schema::{AttributeType, ResourceSchema};
use serde_json::{Map, Value as JsonValue};

/// Look up a dotted path in a JSON body
pub fn get_path<'a>(body: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(body, |current, key| current.get(key))
}

/// Set a dotted path in a JSON body, creating intermediate objects
pub fn set_path(body: &mut JsonValue, path: &str, value: JsonValue) {
    let keys: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    if !body.is_object() {
        *body = JsonValue::Object(Map::new());
    }
    let mut current = body;
    for key in parents {
        if !current.get(*key).is_some_and(JsonValue::is_object) {
            current[*key] = JsonValue::Object(Map::new());
        }
        current = &mut current[*key];
    }
    current[*last] = value;
}

/// Convert JSON value to attribute Value
pub fn json_to_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::String(s) => Some(Value::String(s.clone())),
        JsonValue::Bool(b) => Some(Value::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(|f| Value::Int(f as i64))
            }
        }
        JsonValue::Array(arr) => {
            let items: Vec<Value> = arr.iter().filter_map(json_to_value).collect();
            Some(Value::List(items))
        }
        JsonValue::Object(map) => {
            let entries: HashMap<String, Value> = map
                .iter()
                .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
                .collect();
            Some(Value::Map(entries))
        }
        JsonValue::Null => None,
    }
}

/// Convert attribute Value to JSON value
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::List(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert a value to JSON following its declared type
pub fn expand_value<F>(attr_type: &AttributeType, value: &Value, convert: &F) -> JsonValue
where
    F: Fn(&str, &Value) -> Option<JsonValue>,
{
    match (attr_type, value) {
        (AttributeType::Block(fields), Value::Map(entries)) => {
            let mut object = JsonValue::Object(Map::new());
            for field in fields {
                let Some(value) = entries.get(&field.name).or(field.default.as_ref()) else {
                    continue;
                };
                let path = field.provider_name.as_deref().unwrap_or(&field.name);
                let json = convert(&field.name, value)
                    .unwrap_or_else(|| expand_value(&field.attr_type, value, convert));
                set_path(&mut object, path, json);
            }
            object
        }
        (AttributeType::List(inner), Value::List(items)) => JsonValue::Array(
            items
                .iter()
                .map(|item| expand_value(inner, item, convert))
                .collect(),
        ),
        (AttributeType::Custom { base, .. }, value) => expand_value(base, value, convert),
        _ => value_to_json(value),
    }
}

/// Convert JSON back to a value following its declared type
///
/// Block fields missing from the JSON take their default, if any.
pub fn flatten_value<F>(attr_type: &AttributeType, json: &JsonValue, convert: &F) -> Option<Value>
where
    F: Fn(&str, &JsonValue) -> Option<Value>,
{
    match (attr_type, json) {
        (AttributeType::Block(fields), JsonValue::Object(_)) => {
            let entries = fields
                .iter()
                .filter_map(|field| {
                    let path = field.provider_name.as_deref().unwrap_or(&field.name);
                    let value = match get_path(json, path) {
                        Some(nested) => convert(&field.name, nested)
                            .or_else(|| flatten_value(&field.attr_type, nested, convert)),
                        None => field.default.clone(),
                    }?;
                    Some((field.name.clone(), value))
                })
                .collect();
            Some(Value::Map(entries))
        }
        (AttributeType::List(inner), JsonValue::Array(items)) => Some(Value::List(
            items
                .iter()
                .filter_map(|item| flatten_value(inner, item, convert))
                .collect(),
        )),
        (AttributeType::Custom { base, .. }, json) => flatten_value(base, json, convert),
        _ => json_to_value(json),
    }
}

/// Build a request body from the settable attributes that map to a path
///
/// `convert` may rewrite a value for a given attribute or block field name;
/// returning `None` falls back to the conversion by type.
pub fn expand_attributes(
    schema: &ResourceSchema,
    attributes: &HashMap<String, Value>,
    convert: impl Fn(&str, &Value) -> Option<JsonValue>,
) -> JsonValue {
    let mut body = JsonValue::Object(Map::new());
    for attr in schema.sorted_attributes() {
        if attr.read_only {
            continue;
        }
        if let Some(path) = &attr.provider_name
            && let Some(value) = attributes.get(&attr.name)
        {
            let json = convert(&attr.name, value)
                .unwrap_or_else(|| expand_value(&attr.attr_type, value, &convert));
            set_path(&mut body, path, json);
        }
    }
    body
}

/// Read every attribute that maps to a path out of a response body
///
/// `convert` may rewrite a value for a given attribute or block field name,
/// as in [`expand_attributes`].
pub fn flatten_properties(
    schema: &ResourceSchema,
    body: &JsonValue,
    convert: impl Fn(&str, &JsonValue) -> Option<Value>,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    for attr in schema.attributes.values() {
        if let Some(path) = &attr.provider_name
            && let Some(json) = get_path(body, path)
            && let Some(value) = convert(&attr.name, json)
                .or_else(|| flatten_value(&attr.attr_type, json, &convert))
        {
            attributes.insert(attr.name.clone(), value);
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use azurerm_core::schema::{AttributeSchema, types};
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("azurerm.example")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(
                AttributeSchema::new("sku_name", AttributeType::String)
                    .with_provider_name("properties.sku.name"),
            )
            .attribute(
                AttributeSchema::new("retention_days", AttributeType::Int)
                    .with_provider_name("properties.retentionDays"),
            )
            .attribute(
                AttributeSchema::new("uri", AttributeType::String)
                    .read_only()
                    .with_provider_name("properties.uri"),
            )
            .attribute(
                AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .with_provider_name("tags"),
            )
    }

    #[test]
    fn get_and_set_paths() {
        let mut body = json!({"properties": {"sku": {"family": "A"}}});
        set_path(&mut body, "properties.sku.name", json!("standard"));
        set_path(&mut body, "properties.network.bypass", json!("None"));
        set_path(&mut body, "location", json!("westeurope"));

        assert_eq!(
            body,
            json!({
                "location": "westeurope",
                "properties": {
                    "sku": {"family": "A", "name": "standard"},
                    "network": {"bypass": "None"}
                }
            })
        );
        assert_eq!(get_path(&body, "properties.sku.name"), Some(&json!("standard")));
        assert_eq!(get_path(&body, "properties.missing.name"), None);
    }

    #[test]
    fn set_path_replaces_scalars() {
        let mut body = json!({"properties": "unexpected"});
        set_path(&mut body, "properties.enabled", json!(true));
        assert_eq!(body, json!({"properties": {"enabled": true}}));
    }

    #[test]
    fn json_values() {
        assert_eq!(json_to_value(&json!("a")), Some(Value::String("a".to_string())));
        assert_eq!(json_to_value(&json!(7)), Some(Value::Int(7)));
        assert_eq!(json_to_value(&json!(null)), None);
        assert_eq!(
            json_to_value(&json!(["10.0.0.0/16", null])),
            Some(Value::List(vec![Value::String("10.0.0.0/16".to_string())]))
        );
        assert_eq!(
            value_to_json(&Value::Map(HashMap::from([(
                "env".to_string(),
                Value::String("prod".to_string())
            )]))),
            json!({"env": "prod"})
        );
    }

    #[test]
    fn expand_skips_read_only_and_unmapped() {
        let attributes = HashMap::from([
            ("name".to_string(), Value::from("kv1")),
            ("sku_name".to_string(), Value::from("standard")),
            ("retention_days".to_string(), Value::Int(90)),
            ("uri".to_string(), Value::from("https://kv1.vault.azure.net/")),
        ]);
        let body = expand_attributes(&schema(), &attributes, |_, _| None);
        assert_eq!(
            body,
            json!({"properties": {"sku": {"name": "standard"}, "retentionDays": 90}})
        );
    }

    #[test]
    fn expand_uses_override() {
        let attributes = HashMap::from([("sku_name".to_string(), Value::from("standard"))]);
        let body = expand_attributes(&schema(), &attributes, |name, value| {
            (name == "sku_name").then(|| json!(value.as_str().map(str::to_uppercase)))
        });
        assert_eq!(body, json!({"properties": {"sku": {"name": "STANDARD"}}}));
    }

    #[test]
    fn flatten_reads_mapped_paths() {
        let body = json!({
            "name": "kv1",
            "tags": {"env": "prod"},
            "properties": {
                "sku": {"family": "A", "name": "standard"},
                "uri": "https://kv1.vault.azure.net/",
                "unmapped": true
            }
        });
        let attributes = flatten_properties(&schema(), &body, |_, _| None);

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes["sku_name"], Value::from("standard"));
        assert_eq!(attributes["uri"], Value::from("https://kv1.vault.azure.net/"));
        assert_eq!(
            attributes["tags"],
            Value::Map(HashMap::from([("env".to_string(), Value::from("prod"))]))
        );
    }

    fn policies() -> AttributeType {
        types::block_list(vec![
            AttributeSchema::new("object_id", AttributeType::String)
                .required()
                .with_provider_name("objectId"),
            AttributeSchema::new("key_permissions", types::string_list())
                .with_default(Value::List(vec![]))
                .with_provider_name("permissions.keys"),
            AttributeSchema::new("ip_rules", types::string_list()).with_provider_name("ipRules"),
        ])
    }

    fn policy(entries: &[(&str, Value)]) -> Value {
        Value::Map(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn expands_blocks_to_nested_paths() {
        let value = Value::List(vec![
            policy(&[
                ("object_id", Value::from("a")),
                ("key_permissions", Value::List(vec![Value::from("Get")])),
            ]),
            policy(&[("object_id", Value::from("b"))]),
        ]);
        let json = expand_value(&policies(), &value, &|_: &str, _: &Value| None);
        assert_eq!(
            json,
            json!([
                {"objectId": "a", "permissions": {"keys": ["Get"]}},
                {"objectId": "b", "permissions": {"keys": []}}
            ])
        );
    }

    #[test]
    fn block_fields_use_conversion_override() {
        let value = Value::List(vec![policy(&[
            ("object_id", Value::from("a")),
            ("ip_rules", Value::List(vec![Value::from("10.0.0.1")])),
        ])]);
        let json = expand_value(&policies(), &value, &|name: &str, value: &Value| match (name, value) {
            ("ip_rules", Value::List(items)) => Some(JsonValue::Array(
                items.iter().map(|ip| json!({ "value": ip.as_str() })).collect(),
            )),
            _ => None,
        });
        assert_eq!(json[0]["ipRules"], json!([{"value": "10.0.0.1"}]));

        let back = flatten_value(&policies(), &json, &|name: &str, json: &JsonValue| {
            (name == "ip_rules").then(|| {
                Value::List(
                    json.as_array()
                        .into_iter()
                        .flatten()
                        .filter_map(|rule| rule.get("value").and_then(|v| v.as_str()))
                        .map(Value::from)
                        .collect(),
                )
            })
        });
        assert_eq!(back, Some(value_with_default_keys()));
    }

    fn value_with_default_keys() -> Value {
        Value::List(vec![policy(&[
            ("object_id", Value::from("a")),
            ("key_permissions", Value::List(vec![])),
            ("ip_rules", Value::List(vec![Value::from("10.0.0.1")])),
        ])])
    }

    #[test]
    fn flattens_blocks_filling_defaults() {
        let json = json!([{"objectId": "a", "applicationId": null}]);
        let value = flatten_value(&policies(), &json, &|_: &str, _: &JsonValue| None);
        assert_eq!(
            value,
            Some(Value::List(vec![policy(&[
                ("object_id", Value::from("a")),
                ("key_permissions", Value::List(vec![])),
            ])]))
        );
    }
}
