//! Azurerm Core
//!
//! Provider-agnostic model for declarative infrastructure: resources and their
//! observed state, attribute schemas, diff/plan/apply, plus the polling, locking
//! and timeout helpers shared by provider implementations.

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod locks;
pub mod plan;
pub mod poll;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod timeouts;
