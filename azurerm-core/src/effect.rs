//! Effect - Side effects represented as values
//!
//! An Effect describes one remote operation. Effects are collected into a
//! Plan and only executed by the Interpreter.

use crate::resource::{Resource, ResourceId, State, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read the current state of a resource without managing it
    Read(Resource),
    /// Create a new resource
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete the remote object and create it again
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource by its remote identifier
    Delete {
        id: ResourceId,
        identifier: String,
        /// Declared `timeouts` attribute of the resource
        timeouts: Option<Value>,
    },
}

impl Effect {
    /// Whether executing this Effect changes remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(resource) | Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => {
                id
            }
        }
    }
}
