//! Timeouts - Per-operation deadlines
//!
//! Every resource operation runs under a deadline. The defaults can be
//! overridden per resource through a `timeouts` map such as
//! `{"create": "45m", "delete": "1h30m"}`.

use std::collections::HashMap;
use std::time::Duration;

use crate::resource::Value;
use crate::schema::TIMEOUTS_ATTRIBUTE;

/// Operation kinds that carry a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

impl Timeouts {
    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Apply overrides from a `timeouts` map value
    pub fn with_overrides(mut self, value: &Value) -> Result<Self, String> {
        let Value::Map(entries) = value else {
            return Err(format!(
                "timeouts must be a map, got {}",
                value.type_name()
            ));
        };

        for (key, raw) in entries {
            let Some(raw) = raw.as_str() else {
                return Err(format!("timeouts.{}: expected a duration string", key));
            };
            let duration = parse_duration(raw).map_err(|e| format!("timeouts.{}: {}", key, e))?;
            match key.as_str() {
                "create" => self.create = duration,
                "read" => self.read = duration,
                "update" => self.update = duration,
                "delete" => self.delete = duration,
                other => return Err(format!("unsupported timeout '{}'", other)),
            }
        }
        Ok(self)
    }

    /// Defaults overridden by the resource's `timeouts` attribute, if any
    pub fn from_attributes(
        defaults: Timeouts,
        attributes: &HashMap<String, Value>,
    ) -> Result<Self, String> {
        match attributes.get(TIMEOUTS_ATTRIBUTE) {
            Some(value) => defaults.with_overrides(value),
            None => Ok(defaults),
        }
    }
}

/// Parse a duration string made of `<number><unit>` groups (`h`, `m`, `s`, `ms`)
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let too_large = || format!("duration '{}' is too large", input);
        let step = match unit {
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(amount)),
            "ms" => Some(Duration::from_millis(amount)),
            "" => return Err(format!("missing unit in duration '{}'", input)),
            other => return Err(format!("unknown unit '{}' in duration '{}'", other, input)),
        }
        .ok_or_else(too_large)?;
        total = total.checked_add(step).ok_or_else(too_large)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("45m"), Ok(Duration::from_secs(45 * 60)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m30").is_err());
        assert!(parse_duration("3d").is_err());
        assert_eq!(
            parse_duration("9999999999999999h"),
            Err("duration '9999999999999999h' is too large".to_string())
        );
        assert!(parse_duration("18446744073709551615s18446744073709551615s").is_err());
    }

    #[test]
    fn oversized_override_is_an_error() {
        let mut map = HashMap::new();
        map.insert("create".to_string(), Value::from("9999999999999999h"));
        let err = Timeouts::default().with_overrides(&Value::Map(map)).unwrap_err();
        assert_eq!(err, "timeouts.create: duration '9999999999999999h' is too large");
    }

    #[test]
    fn overrides_only_named_operations() {
        let mut map = HashMap::new();
        map.insert("create".to_string(), Value::from("1h"));
        let timeouts = Timeouts::default().with_overrides(&Value::Map(map)).unwrap();

        assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(3600));
        assert_eq!(timeouts.get(Operation::Read), Duration::from_secs(300));
    }

    #[test]
    fn overrides_reject_unknown_operation() {
        let mut map = HashMap::new();
        map.insert("import".to_string(), Value::from("1h"));
        assert!(Timeouts::default().with_overrides(&Value::Map(map)).is_err());
    }
}
