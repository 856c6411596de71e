//! Edge node registry and request router.
//!
//! Nodes register once and receive an opaque token. That token is the only
//! credential for node-scoped calls (health updates, routing, deployments).
//! Routing picks the first healthy node in registration order and appends a
//! request log for every decision.

pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;
pub mod token;
pub mod validation;

use std::str::FromStr;

use thiserror::Error;

pub use service::{CallerNode, NodeRegistry, RouteContext, RoutingDecision};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid or missing node credential")]
    Authentication,

    #[error("Node {0} may only update its own health status")]
    Forbidden(uuid::Uuid),

    #[error("No healthy node available")]
    NoAvailableNode,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Who may change a node's health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthUpdatePolicy {
    /// Any authenticated node (e.g. a dedicated health checker) may update any node.
    #[default]
    AnyNode,
    /// A node may only update itself.
    SelfOnly,
}

impl FromStr for HealthUpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(HealthUpdatePolicy::AnyNode),
            "self" => Ok(HealthUpdatePolicy::SelfOnly),
            other => Err(format!(
                "unknown health update policy '{other}' (expected 'any' or 'self')"
            )),
        }
    }
}
