use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequestLogRow {
    pub id: Uuid,
    pub node_id: Uuid,
    pub response_time_ms: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub status_code: i32,
    pub client_ip: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view over a node's request logs.
#[derive(Debug, Clone, Serialize)]
pub struct NodePerformance {
    pub node: super::node::NodeRow,
    pub avg_response_time_ms: f64,
    pub total_requests: i64,
}
