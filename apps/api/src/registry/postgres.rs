use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::node::{NodeRow, NodeStatus};
use crate::models::request_log::RequestLogRow;

use super::store::{NewNode, NewRequestLog, NodeStore};
use super::RegistryError;

const NODE_COLUMNS: &str =
    "id, name, address, latitude, longitude, status, token_hash, registered_at, last_health_check";

/// Postgres-backed store. Uniqueness is enforced by the `edge_nodes_name_key`
/// and `edge_nodes_token_hash_key` indexes.
#[derive(Clone)]
pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Conflict for a unique violation on `constraint` while inserting `name`.
fn unique_violation(constraint: Option<&str>, name: &str) -> RegistryError {
    match constraint {
        Some("edge_nodes_token_hash_key") => {
            RegistryError::Conflict("token already issued".to_string())
        }
        Some("edge_nodes_pkey") => RegistryError::Conflict("node id already exists".to_string()),
        _ => RegistryError::Conflict(format!("a node named '{name}' already exists")),
    }
}

fn map_insert_error(err: sqlx::Error, name: &str) -> RegistryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return unique_violation(db_err.constraint(), name);
        }
        if db_err.is_check_violation() {
            return RegistryError::Validation(db_err.message().to_string());
        }
    }
    RegistryError::Storage(err)
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn insert_node(&self, node: NewNode) -> Result<NodeRow, RegistryError> {
        sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            INSERT INTO edge_nodes
                (id, name, address, latitude, longitude, status, token_hash, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(node.id)
        .bind(&node.name)
        .bind(&node.address)
        .bind(node.latitude)
        .bind(node.longitude)
        .bind(node.status)
        .bind(&node.token_hash)
        .bind(node.registered_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &node.name))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM edge_nodes WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM edge_nodes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM edge_nodes ORDER BY registered_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_by_status(&self, status: NodeStatus) -> Result<Vec<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM edge_nodes WHERE status = $1 ORDER BY registered_at ASC, id ASC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn first_with_status(&self, status: NodeStatus) -> Result<Option<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            SELECT {NODE_COLUMNS} FROM edge_nodes
            WHERE status = $1
            ORDER BY registered_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(status)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: NodeStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<NodeRow>, RegistryError> {
        Ok(sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            UPDATE edge_nodes
            SET status = $1, last_health_check = $2
            WHERE id = $3
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(checked_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn append_log(&self, log: NewRequestLog) -> Result<RequestLogRow, RegistryError> {
        sqlx::query_as::<_, RequestLogRow>(
            r#"
            INSERT INTO request_logs
                (id, node_id, response_time_ms, latitude, longitude, status_code, client_ip, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.node_id)
        .bind(log.response_time_ms)
        .bind(log.latitude)
        .bind(log.longitude)
        .bind(log.status_code)
        .bind(&log.client_ip)
        .bind(&log.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // node removed between selection and logging
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                RegistryError::NotFound(format!("Node {} not found", log.node_id))
            }
            _ => RegistryError::Storage(e),
        })
    }

    async fn list_logs(&self, node_id: Option<Uuid>) -> Result<Vec<RequestLogRow>, RegistryError> {
        Ok(sqlx::query_as::<_, RequestLogRow>(
            r#"
            SELECT * FROM request_logs
            WHERE $1::uuid IS NULL OR node_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn log_stats(&self, node_id: Uuid) -> Result<(f64, i64), RegistryError> {
        Ok(sqlx::query_as::<_, (f64, i64)>(
            r#"
            SELECT COALESCE(AVG(response_time_ms), 0)::float8, COUNT(*)
            FROM request_logs
            WHERE node_id = $1
            "#,
        )
        .bind(node_id)
        .fetch_one(&self.pool)
        .await?)
    }
}
