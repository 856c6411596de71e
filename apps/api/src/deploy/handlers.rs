use axum::{extract::State, Extension, Json};
use serde_json::Value;
use tracing::info;

use crate::deploy::DeploymentResult;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::registry::CallerNode;
use crate::state::AppState;

/// POST /api/v1/deployments
///
/// Body is the deployment payload object, forwarded as the mutation input.
pub async fn handle_deploy(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerNode>,
    AppJson(payload): AppJson<Value>,
) -> Result<Json<DeploymentResult>, AppError> {
    let target = state.registry.select_node().await?;
    info!(
        caller = %caller.node().name,
        target_node = %target.name,
        "Triggering deployment"
    );

    let result = state.deployer.deploy(payload, &target.name).await?;
    Ok(Json(result))
}
