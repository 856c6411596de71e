use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::node::{NodeRow, NodeStatus};
use crate::models::request_log::RequestLogRow;

use super::store::{NewNode, NewRequestLog, NodeStore};
use super::RegistryError;

#[derive(Default)]
struct Inner {
    nodes: HashMap<Uuid, NodeRow>,
    /// Append order, which is also `created_at` order.
    logs: Vec<RequestLogRow>,
}

impl Inner {
    fn sorted_nodes(&self, filter: impl Fn(&NodeRow) -> bool) -> Vec<NodeRow> {
        let mut nodes: Vec<&NodeRow> = self.nodes.values().filter(|&n| filter(n)).collect();
        nodes.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes.into_iter().cloned().collect()
    }
}

/// Process-local node store. Uniqueness checks and the insert share one write
/// lock, so racing registrations of the same name cannot both succeed.
#[derive(Clone, Default)]
pub struct MemoryNodeStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn insert_node(&self, node: NewNode) -> Result<NodeRow, RegistryError> {
        let mut inner = self.inner.write().await;

        if inner.nodes.values().any(|n| n.name == node.name) {
            return Err(RegistryError::Conflict(format!(
                "a node named '{}' already exists",
                node.name
            )));
        }
        if inner.nodes.values().any(|n| n.token_hash == node.token_hash) {
            return Err(RegistryError::Conflict("token already issued".to_string()));
        }
        if inner.nodes.contains_key(&node.id) {
            return Err(RegistryError::Conflict(format!("node id {} already exists", node.id)));
        }

        let row = NodeRow {
            id: node.id,
            name: node.name,
            address: node.address,
            latitude: node.latitude,
            longitude: node.longitude,
            status: node.status,
            token_hash: node.token_hash,
            registered_at: node.registered_at,
            last_health_check: None,
        };
        inner.nodes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<NodeRow>, RegistryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .find(|n| n.token_hash == token_hash)
            .cloned())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<NodeRow>, RegistryError> {
        Ok(self.inner.read().await.nodes.get(&id).cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRow>, RegistryError> {
        Ok(self.inner.read().await.sorted_nodes(|_| true))
    }

    async fn find_by_status(&self, status: NodeStatus) -> Result<Vec<NodeRow>, RegistryError> {
        Ok(self.inner.read().await.sorted_nodes(|n| n.status == status))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: NodeStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<NodeRow>, RegistryError> {
        let mut inner = self.inner.write().await;
        Ok(inner.nodes.get_mut(&id).map(|node| {
            node.status = status;
            node.last_health_check = Some(checked_at);
            node.clone()
        }))
    }

    async fn append_log(&self, log: NewRequestLog) -> Result<RequestLogRow, RegistryError> {
        let mut inner = self.inner.write().await;
        if !inner.nodes.contains_key(&log.node_id) {
            return Err(RegistryError::NotFound(format!("Node {} not found", log.node_id)));
        }

        let row = RequestLogRow {
            id: Uuid::new_v4(),
            node_id: log.node_id,
            response_time_ms: log.response_time_ms,
            latitude: log.latitude,
            longitude: log.longitude,
            status_code: log.status_code,
            client_ip: log.client_ip,
            metadata: log.metadata,
            created_at: Utc::now(),
        };
        inner.logs.push(row.clone());
        Ok(row)
    }

    async fn list_logs(&self, node_id: Option<Uuid>) -> Result<Vec<RequestLogRow>, RegistryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|log| node_id.map_or(true, |id| log.node_id == id))
            .cloned()
            .collect())
    }

    async fn log_stats(&self, node_id: Uuid) -> Result<(f64, i64), RegistryError> {
        let inner = self.inner.read().await;
        let (sum, count) = inner
            .logs
            .iter()
            .filter(|log| log.node_id == node_id)
            .fold((0.0_f64, 0_i64), |(sum, count), log| {
                (sum + log.response_time_ms, count + 1)
            });
        let avg = if count == 0 { 0.0 } else { sum / count as f64 };
        Ok((avg, count))
    }
}
