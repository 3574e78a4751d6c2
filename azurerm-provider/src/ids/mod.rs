//! Resource IDs - Parse and format ARM resource identifiers
//!
//! An ARM ID is a `/`-separated path of static segments (`subscriptions`,
//! `resourceGroups`, `providers`, provider namespaces and type names) and
//! user-specified values. Typed IDs declare their layout as a list of
//! `(static prefix, labelled value)` pairs; the helpers here split and rejoin
//! paths against such a layout.

mod arm;
mod keyvault;
mod network;
mod postgres;
mod resources;
mod storage;
mod subscription;

pub use arm::ArmResourceId;
pub use keyvault::{DeletedVaultId, KeyVaultId};
pub use network::{SubnetId, VirtualNetworkId};
pub use postgres::FlexibleServerId;
pub use resources::{ResourceGroupId, SubscriptionId};
pub use storage::StorageAccountId;
pub use subscription::SubscriptionAliasId;

use thiserror::Error;

/// Error parsing an ARM resource ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("ID was empty")]
    Empty,

    #[error("parsing {input:?}: the ID must start with '/'")]
    MissingLeadingSlash { input: String },

    #[error(
        "parsing {input:?} as {description} ID: expected the segment {expected:?} at position {position} but got {got:?}"
    )]
    UnexpectedSegment {
        input: String,
        description: &'static str,
        position: usize,
        expected: String,
        got: String,
    },

    #[error("parsing {input:?} as {description} ID: the segment {expected:?} was not found")]
    MissingSegment {
        input: String,
        description: &'static str,
        expected: String,
    },

    #[error("parsing {input:?} as {description} ID: the value for {label:?} was missing or empty")]
    MissingValue {
        input: String,
        description: &'static str,
        label: &'static str,
    },

    #[error("parsing {input:?} as {description} ID: unexpected trailing segments {trailing:?}")]
    TrailingSegments {
        input: String,
        description: &'static str,
        trailing: String,
    },

    #[error("parsing {input:?}: {message}")]
    Malformed { input: String, message: String },
}

/// Layout of a typed ID: each entry is a static prefix (one or more
/// `/`-separated segments) followed by one user-specified value
pub type Layout = &'static [(&'static str, &'static str)];

/// A typed ARM resource ID
pub trait ResourceIdFormat: Sized {
    /// Human readable name, e.g. "Storage Account"
    const DESCRIPTION: &'static str;
    const LAYOUT: Layout;

    fn from_values(values: Vec<String>) -> Self;

    /// User-specified values in layout order
    fn values(&self) -> Vec<&str>;

    /// Parse an ID, matching static segments exactly
    fn parse(input: &str) -> Result<Self, IdParseError> {
        parse_layout(input, Self::DESCRIPTION, Self::LAYOUT, false).map(Self::from_values)
    }

    /// Parse an ID, matching static segments case-insensitively
    ///
    /// The API is not consistent about the casing it returns
    /// (`resourceGroups` vs `resourcegroups`), so IDs read back from it are
    /// parsed this way.
    fn parse_insensitively(input: &str) -> Result<Self, IdParseError> {
        parse_layout(input, Self::DESCRIPTION, Self::LAYOUT, true).map(Self::from_values)
    }

    /// Format the ID as an ARM path
    fn id(&self) -> String {
        format_layout(Self::LAYOUT, &self.values())
    }

    /// Multi-line description naming each value
    fn describe(&self) -> String {
        let components: Vec<String> = Self::LAYOUT
            .iter()
            .zip(self.values())
            .map(|((_, label), value)| format!("{}: {:?}", label, value))
            .collect();
        format!("{} ({})", Self::DESCRIPTION, components.join("\n"))
    }
}

/// Split `input` against `layout`, returning the user-specified values
pub fn parse_layout(
    input: &str,
    description: &'static str,
    layout: Layout,
    insensitively: bool,
) -> Result<Vec<String>, IdParseError> {
    if input.is_empty() {
        return Err(IdParseError::Empty);
    }
    let Some(path) = input.strip_prefix('/') else {
        return Err(IdParseError::MissingLeadingSlash {
            input: input.to_string(),
        });
    };

    let parts: Vec<&str> = path.split('/').collect();
    let mut position = 0;
    let mut values = Vec::with_capacity(layout.len());

    for (prefix, label) in layout {
        for expected in prefix.split('/') {
            let Some(got) = parts.get(position) else {
                return Err(IdParseError::MissingSegment {
                    input: input.to_string(),
                    description,
                    expected: expected.to_string(),
                });
            };
            let matches = if insensitively {
                got.eq_ignore_ascii_case(expected)
            } else {
                *got == expected
            };
            if !matches {
                return Err(IdParseError::UnexpectedSegment {
                    input: input.to_string(),
                    description,
                    position,
                    expected: expected.to_string(),
                    got: got.to_string(),
                });
            }
            position += 1;
        }

        match parts.get(position) {
            Some(value) if !value.is_empty() => values.push(value.to_string()),
            _ => {
                return Err(IdParseError::MissingValue {
                    input: input.to_string(),
                    description,
                    label,
                });
            }
        }
        position += 1;
    }

    if position != parts.len() {
        return Err(IdParseError::TrailingSegments {
            input: input.to_string(),
            description,
            trailing: parts[position..].join("/"),
        });
    }

    Ok(values)
}

/// Join a layout and its values back into an ARM path
pub fn format_layout(layout: Layout, values: &[&str]) -> String {
    let mut id = String::new();
    for ((prefix, _), value) in layout.iter().zip(values) {
        id.push('/');
        id.push_str(prefix);
        id.push('/');
        id.push_str(value);
    }
    id
}

/// Defines a typed resource ID from its layout
macro_rules! resource_id {
    (
        $(#[$meta:meta])*
        $name:ident, $description:literal {
            $($prefix:literal => $field:ident : $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl $name {
            pub fn new($($field: impl Into<String>),+) -> Self {
                Self {
                    $($field: $field.into(),)+
                }
            }
        }

        impl $crate::ids::ResourceIdFormat for $name {
            const DESCRIPTION: &'static str = $description;
            const LAYOUT: $crate::ids::Layout = &[$(($prefix, $label)),+];

            fn from_values(values: Vec<String>) -> Self {
                let mut values = values.into_iter();
                Self {
                    $($field: values.next().unwrap_or_default(),)+
                }
            }

            fn values(&self) -> Vec<&str> {
                vec![$(self.$field.as_str()),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&$crate::ids::ResourceIdFormat::describe(self))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ids::IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as $crate::ids::ResourceIdFormat>::parse(s)
            }
        }
    };
}

pub(crate) use resource_id;

/// Validator for ID attributes of a given type
pub fn validate_id<T: ResourceIdFormat>(value: &str) -> Result<(), String> {
    T::parse(value).map(|_| ()).map_err(|e| e.to_string())
}
