use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::node::{NodeRow, NodeStatus};
use crate::models::request_log::{NodePerformance, RequestLogRow};
use crate::registry::validation::RegisterNodeRequest;
use crate::registry::{CallerNode, RouteContext, RoutingDecision};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RegisterNodeResponse {
    pub node: NodeRow,
    /// Shown once. Only its digest is stored.
    pub token: String,
}

#[derive(Deserialize)]
pub struct SetHealthRequest {
    pub status: NodeStatus,
}

#[derive(Deserialize)]
pub struct RouteRequestBody {
    /// Logged as sent; only an absent field becomes `{}`.
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

fn empty_metadata() -> Value {
    Value::Object(Default::default())
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub node_id: Option<Uuid>,
}

/// POST /api/v1/edge-nodes
pub async fn handle_register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterNodeRequest>,
) -> Result<(StatusCode, Json<RegisterNodeResponse>), AppError> {
    let (node, token) = state.registry.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterNodeResponse {
            node,
            token: token.expose_secret().to_string(),
        }),
    ))
}

/// GET /api/v1/edge-nodes
pub async fn handle_list_nodes(
    State(state): State<AppState>,
) -> Result<Json<Vec<NodeRow>>, AppError> {
    Ok(Json(state.registry.list_nodes().await?))
}

/// GET /api/v1/edge-nodes/:id
pub async fn handle_get_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NodeRow>, AppError> {
    Ok(Json(state.registry.get_node(id).await?))
}

/// PATCH /api/v1/edge-nodes/:id/health
pub async fn handle_set_health(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerNode>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<SetHealthRequest>,
) -> Result<Json<NodeRow>, AppError> {
    Ok(Json(state.registry.set_health(&caller, id, req.status).await?))
}

/// GET /api/v1/edge-nodes/:id/logs
pub async fn handle_node_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RequestLogRow>>, AppError> {
    Ok(Json(state.registry.node_logs(Some(id)).await?))
}

/// GET /api/v1/edge-nodes/:id/performance
pub async fn handle_node_performance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NodePerformance>, AppError> {
    Ok(Json(state.registry.node_performance(id).await?))
}

/// GET /api/v1/request-logs
pub async fn handle_request_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<Vec<RequestLogRow>>, AppError> {
    Ok(Json(state.registry.node_logs(params.node_id).await?))
}

/// POST /api/v1/route-request
pub async fn handle_route_request(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerNode>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    AppJson(body): AppJson<RouteRequestBody>,
) -> Result<Json<RoutingDecision>, AppError> {
    let context = RouteContext {
        metadata: body.metadata,
        client_ip: connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
    };
    Ok(Json(state.registry.route_request(&caller, context).await?))
}
