//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling validation of a
//! declared configuration before any remote call is made.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::resource::Value;

/// Validation function attached to a custom type
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Attribute type
#[derive(Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: ValidateFn,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block: a map with a fixed set of fields
    ///
    /// A field's `provider_name` is its path inside the block's JSON object.
    Block(Vec<AttributeSchema>),
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Custom { name, base, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("base", base)
                .finish_non_exhaustive(),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(fields), Value::Map(entries)) => {
                if let Some(missing) = fields
                    .iter()
                    .find(|f| f.required && f.default.is_none() && !entries.contains_key(&f.name))
                {
                    return Err(TypeError::MissingRequired {
                        name: missing.name.clone(),
                    });
                }

                let mut keys: Vec<&String> = entries.keys().collect();
                keys.sort();
                for key in keys {
                    let Some(field) = fields.iter().find(|f| &f.name == key) else {
                        return Err(TypeError::UnknownAttribute { name: key.clone() });
                    };
                    field
                        .attr_type
                        .validate(&entries[key])
                        .map_err(|e| TypeError::MapValueError {
                            key: key.clone(),
                            inner: Box::new(e),
                        })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                format!("Block {{ {} }}", names.join(", "))
            }
        }
    }

    /// Fill unset block fields that declare a default value, at any depth
    pub fn apply_defaults(&self, value: &mut Value) {
        match (self, value) {
            (AttributeType::Block(fields), Value::Map(entries)) => {
                for field in fields {
                    if let Some(nested) = entries.get_mut(&field.name) {
                        field.attr_type.apply_defaults(nested);
                    } else if let Some(default) = &field.default {
                        entries.insert(field.name.clone(), default.clone());
                    }
                }
            }
            (AttributeType::List(inner), Value::List(items)) => {
                for item in items {
                    inner.apply_defaults(item);
                }
            }
            (AttributeType::Custom { base, .. }, value) => base.apply_defaults(value),
            _ => {}
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ReadOnly { name: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the remote API only
    pub read_only: bool,
    /// Optional, but the remote API fills a value when left unset
    pub computed: bool,
    /// Changing the value requires replacing the remote object
    pub force_new: bool,
    /// Never shown in plan output; may be absent from remote reads
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Dotted path of the property in the remote JSON body (e.g., "properties.sku.name")
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            read_only: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self.computed = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Attribute key holding per-operation timeout overrides
pub const TIMEOUTS_ATTRIBUTE: &str = "timeouts";

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Attributes sorted by name, for stable display
    pub fn sorted_attributes(&self) -> Vec<&AttributeSchema> {
        let mut attrs: Vec<&AttributeSchema> = self.attributes.values().collect();
        attrs.sort_by(|a, b| a.name.cmp(&b.name));
        attrs
    }

    /// Fill unset attributes and block fields that declare a default value
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        for (name, schema) in &self.attributes {
            if let Some(value) = attributes.get_mut(name) {
                schema.attr_type.apply_defaults(value);
            } else if let Some(default) = &schema.default {
                attributes.insert(name.clone(), default.clone());
            }
        }
    }

    /// Validate attributes, collecting every error
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        let mut required: Vec<&String> = self
            .attributes
            .iter()
            .filter(|(_, s)| s.required && s.default.is_none())
            .map(|(name, _)| name)
            .collect();
        required.sort();
        for name in required {
            if !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        for name in names {
            if name.starts_with('_') {
                continue;
            }
            let value = &attributes[name];
            if name == TIMEOUTS_ATTRIBUTE {
                if let Err(e) = types::timeouts().validate(value) {
                    errors.push(TypeError::AttributeError {
                        name: name.clone(),
                        inner: Box::new(e),
                    });
                }
                continue;
            }
            match self.attributes.get(name) {
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
                Some(schema) if schema.read_only => {
                    errors.push(TypeError::ReadOnly { name: name.clone() })
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(TypeError::AttributeError {
                            name: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Custom type validated by a string check function
    pub fn custom_string(
        name: impl Into<String>,
        check: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    ) -> AttributeType {
        AttributeType::Custom {
            name: name.into(),
            base: Box::new(AttributeType::String),
            validate: Arc::new(move |value| match value {
                Value::String(s) => check(s),
                _ => Err("Expected string".to_string()),
            }),
        }
    }

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        int_between(1, i64::MAX)
    }

    /// Integer type with inclusive bounds
    pub fn int_between(min: i64, max: i64) -> AttributeType {
        AttributeType::Custom {
            name: format!("Int({}..={})", min, max),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(move |value| match value {
                Value::Int(n) if (min..=max).contains(n) => Ok(()),
                Value::Int(n) => Err(format!(
                    "expected to be in the range ({} - {}), got {}",
                    min, max, n
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Integer type restricted to a fixed set of values
    pub fn int_in_slice(allowed: &[i64]) -> AttributeType {
        let allowed = allowed.to_vec();
        AttributeType::Custom {
            name: "IntInSlice".to_string(),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(move |value| match value {
                Value::Int(n) if allowed.contains(n) => Ok(()),
                Value::Int(n) => {
                    let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                    Err(format!(
                        "expected to be one of [{}], got {}",
                        allowed.join(" "),
                        n
                    ))
                }
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Non-empty string type
    pub fn non_empty_string() -> AttributeType {
        custom_string("NonEmptyString", |s| {
            if s.trim().is_empty() {
                Err("expected a non-empty string".to_string())
            } else {
                Ok(())
            }
        })
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        custom_string("Cidr", validate_cidr)
    }

    /// String-to-string tag map
    pub fn tags() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// Nested block with the given fields
    pub fn block(fields: Vec<AttributeSchema>) -> AttributeType {
        AttributeType::Block(fields)
    }

    /// Repeatable nested block
    pub fn block_list(fields: Vec<AttributeSchema>) -> AttributeType {
        AttributeType::List(Box::new(block(fields)))
    }

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// `timeouts` block: map of operation name to duration string
    pub fn timeouts() -> AttributeType {
        AttributeType::Custom {
            name: "Timeouts".to_string(),
            base: Box::new(AttributeType::Map(Box::new(AttributeType::String))),
            validate: Arc::new(|value| {
                crate::timeouts::Timeouts::default()
                    .with_overrides(value)
                    .map(|_| ())
            }),
        }
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    };

    validate_ipv4(ip)?;

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

/// Validate a dotted-quad IPv4 address
pub fn validate_ipv4(ip: &str) -> Result<(), String> {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }
    Ok(())
}
