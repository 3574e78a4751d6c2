use std::fmt;

use super::IdParseError;

/// Any ARM resource ID, split into its well-known parts
///
/// Typed IDs are preferred wherever the resource type is known; this is for
/// IDs of arbitrary type (`parse-id`, resource group contents).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArmResourceId {
    pub subscription_id: Option<String>,
    pub resource_group_name: Option<String>,
    pub provider: Option<String>,
    /// Remaining `(type, name)` pairs, e.g. `[("virtualNetworks", "vnet1"), ("subnets", "a")]`
    pub path: Vec<(String, String)>,
}

impl ArmResourceId {
    pub fn parse(input: &str) -> Result<Self, IdParseError> {
        if input.is_empty() {
            return Err(IdParseError::Empty);
        }
        let Some(path) = input.strip_prefix('/') else {
            return Err(IdParseError::MissingLeadingSlash {
                input: input.to_string(),
            });
        };
        let malformed = |message: &str| IdParseError::Malformed {
            input: input.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed("the ID contains an empty segment"));
        }

        let mut id = ArmResourceId::default();
        let mut iter = parts.into_iter();
        while let Some(key) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| malformed(&format!("no value for segment {:?}", key)))?;

            if key.eq_ignore_ascii_case("subscriptions") && id.is_empty_scope() {
                id.subscription_id = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("resourceGroups")
                && id.resource_group_name.is_none()
                && id.provider.is_none()
            {
                id.resource_group_name = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("providers") && id.provider.is_none() {
                id.provider = Some(value.to_string());
            } else {
                id.path.push((key.to_string(), value.to_string()));
            }
        }

        if id.provider.is_none() && !id.path.is_empty() {
            return Err(malformed("resource segments must follow a provider namespace"));
        }

        Ok(id)
    }

    fn is_empty_scope(&self) -> bool {
        self.subscription_id.is_none()
            && self.resource_group_name.is_none()
            && self.provider.is_none()
            && self.path.is_empty()
    }

    /// Full resource type, e.g. `Microsoft.Network/virtualNetworks/subnets`
    pub fn resource_type(&self) -> Option<String> {
        let provider = self.provider.as_ref()?;
        let mut resource_type = provider.clone();
        for (kind, name) in &self.path {
            // Extension resources restart the type at their own namespace
            if kind.eq_ignore_ascii_case("providers") {
                resource_type = name.clone();
                continue;
            }
            resource_type.push('/');
            resource_type.push_str(kind);
        }
        Some(resource_type)
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        self.path
            .last()
            .map(|(_, name)| name.as_str())
            .or(self.resource_group_name.as_deref())
            .or(self.subscription_id.as_deref())
    }
}

impl fmt::Display for ArmResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subscription) = &self.subscription_id {
            write!(f, "/subscriptions/{}", subscription)?;
        }
        if let Some(group) = &self.resource_group_name {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (kind, name) in &self.path {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}
