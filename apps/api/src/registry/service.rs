use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::node::{NodeRow, NodeStatus};
use crate::models::request_log::{NodePerformance, RequestLogRow};

use super::store::{NewNode, NewRequestLog, NodeStore};
use super::token::{generate_token, hash_token, IssuedToken};
use super::validation::RegisterNodeRequest;
use super::{HealthUpdatePolicy, RegistryError};

/// Status code recorded for a routing decision that produced a node.
const ROUTED_STATUS_CODE: i32 = 200;

/// A node whose token has been verified. Only [`NodeRegistry::authenticate`]
/// can produce one, so holding it is proof of authentication.
#[derive(Debug, Clone)]
pub struct CallerNode {
    node: NodeRow,
}

impl CallerNode {
    pub fn node(&self) -> &NodeRow {
        &self.node
    }

    pub fn id(&self) -> Uuid {
        self.node.id
    }
}

/// Inputs to a routing decision besides the caller.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    /// Logged verbatim.
    pub metadata: Value,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub node_id: Uuid,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub log_id: Uuid,
}

/// Registration, authentication, health updates and routing over a [`NodeStore`].
///
/// Holds no state of its own between calls; all shared state lives in the store.
#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn NodeStore>,
    health_policy: HealthUpdatePolicy,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn NodeStore>, health_policy: HealthUpdatePolicy) -> Self {
        Self {
            store,
            health_policy,
        }
    }

    /// Validates and persists a new node, returning the plaintext token once.
    /// New nodes start `healthy`.
    pub async fn register(
        &self,
        request: RegisterNodeRequest,
    ) -> Result<(NodeRow, IssuedToken), RegistryError> {
        let valid = request.validate()?;
        let token = generate_token();

        let node = self
            .store
            .insert_node(NewNode {
                id: Uuid::new_v4(),
                name: valid.name,
                address: valid.address,
                latitude: valid.latitude,
                longitude: valid.longitude,
                status: NodeStatus::Healthy,
                token_hash: hash_token(token.expose_secret()),
                registered_at: Utc::now(),
            })
            .await?;

        info!(node_id = %node.id, name = %node.name, address = %node.address, "Registered edge node");
        Ok((node, token))
    }

    pub async fn authenticate(&self, token: &str) -> Result<CallerNode, RegistryError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RegistryError::Authentication);
        }

        match self.store.find_by_token_hash(&hash_token(token)).await? {
            Some(node) => Ok(CallerNode { node }),
            None => {
                warn!("Rejected unknown node token");
                Err(RegistryError::Authentication)
            }
        }
    }

    /// Sets `status` and stamps `last_health_check`. Idempotent.
    pub async fn set_health(
        &self,
        caller: &CallerNode,
        node_id: Uuid,
        status: NodeStatus,
    ) -> Result<NodeRow, RegistryError> {
        if self.health_policy == HealthUpdatePolicy::SelfOnly && caller.id() != node_id {
            warn!(caller = %caller.id(), target = %node_id, "Refused cross-node health update");
            return Err(RegistryError::Forbidden(caller.id()));
        }

        let node = self
            .store
            .update_status(node_id, status, Utc::now())
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("Node {node_id} not found")))?;

        info!(
            node_id = %node.id,
            status = node.status.as_str(),
            reported_by = %caller.id(),
            "Updated node health"
        );
        Ok(node)
    }

    /// First healthy node in registration order. Coordinates are not consulted.
    pub async fn select_node(&self) -> Result<NodeRow, RegistryError> {
        self.store
            .first_with_status(NodeStatus::Healthy)
            .await?
            .ok_or(RegistryError::NoAvailableNode)
    }

    /// Picks a node for the caller's request and appends one request log.
    ///
    /// Selection is a point-in-time read: a node may turn unhealthy right after
    /// being chosen.
    pub async fn route_request(
        &self,
        caller: &CallerNode,
        context: RouteContext,
    ) -> Result<RoutingDecision, RegistryError> {
        let started = Instant::now();
        let node = match self.select_node().await {
            Ok(node) => node,
            Err(RegistryError::NoAvailableNode) => {
                warn!(caller = %caller.id(), "No healthy node available for routing");
                return Err(RegistryError::NoAvailableNode);
            }
            Err(e) => return Err(e),
        };
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let log = self
            .store
            .append_log(NewRequestLog {
                node_id: node.id,
                response_time_ms,
                latitude: node.latitude,
                longitude: node.longitude,
                status_code: ROUTED_STATUS_CODE,
                client_ip: context.client_ip,
                metadata: context.metadata,
            })
            .await?;

        info!(
            caller = %caller.id(),
            node_id = %node.id,
            name = %node.name,
            "Routed request"
        );

        Ok(RoutingDecision {
            node_id: node.id,
            name: node.name,
            address: node.address,
            latitude: node.latitude,
            longitude: node.longitude,
            log_id: log.id,
        })
    }

    pub async fn list_nodes(&self) -> Result<Vec<NodeRow>, RegistryError> {
        self.store.list_nodes().await
    }

    pub async fn get_node(&self, node_id: Uuid) -> Result<NodeRow, RegistryError> {
        self.store
            .get_node(node_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("Node {node_id} not found")))
    }

    /// All request logs, or only those of `node_id` (which must exist). Newest first.
    pub async fn node_logs(&self, node_id: Option<Uuid>) -> Result<Vec<RequestLogRow>, RegistryError> {
        if let Some(id) = node_id {
            self.get_node(id).await?;
        }
        self.store.list_logs(node_id).await
    }

    pub async fn node_performance(&self, node_id: Uuid) -> Result<NodePerformance, RegistryError> {
        let node = self.get_node(node_id).await?;
        let (avg_response_time_ms, total_requests) = self.store.log_stats(node_id).await?;
        Ok(NodePerformance {
            node,
            avg_response_time_ms,
            total_requests,
        })
    }
}
