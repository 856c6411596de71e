use crate::deploy::DeployClient;
use crate::registry::NodeRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub registry: NodeRegistry,
    pub deployer: DeployClient,
}
