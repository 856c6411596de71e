use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::node::{NodeRow, NodeStatus};
use crate::models::request_log::RequestLogRow;

use super::RegistryError;

/// A node ready to be persisted. The token is already hashed.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: NodeStatus,
    pub token_hash: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub node_id: Uuid,
    pub response_time_ms: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub status_code: i32,
    pub client_ip: Option<String>,
    pub metadata: Value,
}

/// Persistence for nodes and their request logs.
///
/// Implementations must enforce uniqueness of `name` and `token_hash` atomically
/// with the insert and report a duplicate as [`RegistryError::Conflict`].
/// Listings of nodes are ordered by `registered_at`, then `id`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn insert_node(&self, node: NewNode) -> Result<NodeRow, RegistryError>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<NodeRow>, RegistryError>;

    async fn get_node(&self, id: Uuid) -> Result<Option<NodeRow>, RegistryError>;

    async fn list_nodes(&self) -> Result<Vec<NodeRow>, RegistryError>;

    async fn find_by_status(&self, status: NodeStatus) -> Result<Vec<NodeRow>, RegistryError>;

    /// First node with `status` in routing order.
    async fn first_with_status(&self, status: NodeStatus) -> Result<Option<NodeRow>, RegistryError> {
        Ok(self.find_by_status(status).await?.into_iter().next())
    }

    /// Sets status and `last_health_check`. Returns `None` for an unknown id.
    async fn update_status(
        &self,
        id: Uuid,
        status: NodeStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<NodeRow>, RegistryError>;

    async fn append_log(&self, log: NewRequestLog) -> Result<RequestLogRow, RegistryError>;

    /// Logs newest first, optionally restricted to one node.
    async fn list_logs(&self, node_id: Option<Uuid>) -> Result<Vec<RequestLogRow>, RegistryError>;

    /// `(average response_time_ms, number of logs)` for a node; average is 0 with no logs.
    async fn log_stats(&self, node_id: Uuid) -> Result<(f64, i64), RegistryError>;
}
