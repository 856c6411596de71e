pub mod health;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::auth::require_node;
use crate::deploy::handlers as deploy_handlers;
use crate::registry::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Routes that need an authenticated edge node
    let node_routes = Router::new()
        .route(
            "/api/v1/edge-nodes/:id/health",
            patch(handlers::handle_set_health),
        )
        .route(
            "/api/v1/route-request",
            post(handlers::handle_route_request),
        )
        .route("/api/v1/deployments", post(deploy_handlers::handle_deploy))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_node));

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/edge-nodes",
            get(handlers::handle_list_nodes).post(handlers::handle_register),
        )
        .route("/api/v1/edge-nodes/:id", get(handlers::handle_get_node))
        .route(
            "/api/v1/edge-nodes/:id/logs",
            get(handlers::handle_node_logs),
        )
        .route(
            "/api/v1/edge-nodes/:id/performance",
            get(handlers::handle_node_performance),
        )
        .route("/api/v1/request-logs", get(handlers::handle_request_logs))
        .merge(node_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::deploy::{DeployClient, DeployCredentials, DEFAULT_API_URL};
    use crate::registry::memory::MemoryNodeStore;
    use crate::registry::{HealthUpdatePolicy, NodeRegistry};

    fn build_app() -> Router {
        let registry =
            NodeRegistry::new(Arc::new(MemoryNodeStore::new()), HealthUpdatePolicy::AnyNode);
        let deployer = DeployClient::new(
            DEFAULT_API_URL.to_string(),
            DeployCredentials {
                api_token: None,
                app_name: None,
            },
        )
        .unwrap();
        build_router(AppState { registry, deployer })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("X-API-KEY", token);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &'static str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header("X-API-KEY", token);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn assert_validation_error(status: StatusCode, body: &Value) {
        assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {body}");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].is_string());
    }

    async fn register(app: &Router, name: &str) -> (String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/edge-nodes",
            None,
            Some(json!({
                "name": name,
                "address": "10.0.0.5",
                "latitude": 48.85,
                "longitude": 2.35
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["node"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_returns_token_once_and_hides_digest() {
        let app = build_app();
        let (id, token) = register(&app, "paris-1").await;
        assert!(token.starts_with("edg_"));

        let (status, node) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node["name"], "paris-1");
        assert_eq!(node["status"], "healthy");
        assert!(node.get("token_hash").is_none());
        assert!(node.get("token").is_none());
    }

    #[tokio::test]
    async fn test_register_validation_and_conflict() {
        let app = build_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/edge-nodes",
            None,
            Some(json!({"name": "x", "address": "10.0.0.1", "latitude": 91, "longitude": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/edge-nodes",
            None,
            Some(json!({"name": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        register(&app, "dup").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/edge-nodes",
            None,
            Some(json!({"name": "dup", "address": "10.0.0.2", "latitude": 0, "longitude": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_route_request_requires_credential() {
        let app = build_app();
        register(&app, "edge").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            None,
            Some(json!({"metadata": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some("edg_not_a_real_token"),
            Some(json!({"metadata": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_route_request_accepts_bearer_token() {
        let app = build_app();
        let (_, token) = register(&app, "edge").await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/route-request")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_route_request_logs_decision() {
        let app = build_app();
        let (id, token) = register(&app, "edge").await;

        let (status, decision) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some(&token),
            Some(json!({"metadata": {"path": "/applicants", "method": "GET"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decision["node_id"], id.as_str());
        assert_eq!(decision["name"], "edge");
        assert_eq!(decision["address"], "10.0.0.5");

        let (status, logs) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}/logs"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["metadata"]["path"], "/applicants");
        assert_eq!(logs[0]["id"], decision["log_id"]);

        let (_, perf) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}/performance"),
            None,
            None,
        )
        .await;
        assert_eq!(perf["total_requests"], 1);
        assert_eq!(perf["node"]["name"], "edge");

        let (_, all_logs) = send(
            &app,
            Method::GET,
            &format!("/api/v1/request-logs?node_id={id}"),
            None,
            None,
        )
        .await;
        assert_eq!(all_logs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_registry_returns_503() {
        let app = build_app();
        let (id, token) = register(&app, "edge").await;

        let (status, node) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/edge-nodes/{id}/health"),
            Some(&token),
            Some(json!({"status": "unhealthy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node["status"], "unhealthy");
        assert!(node["last_health_check"].is_string());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_set_health_unknown_node_is_404() {
        let app = build_app();
        let (_, token) = register(&app, "edge").await;
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/edge-nodes/{}/health", uuid::Uuid::new_v4()),
            Some(&token),
            Some(json!({"status": "healthy"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_health_requires_credential() {
        let app = build_app();
        let (id, _) = register(&app, "edge").await;
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/edge-nodes/{id}/health"),
            None,
            Some(json!({"status": "unhealthy"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_nodes_in_registration_order() {
        let app = build_app();
        register(&app, "first").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        register(&app, "second").await;

        let (status, nodes) = send(&app, Method::GET, "/api/v1/edge-nodes", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = nodes
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_deploy_without_platform_credentials_is_503() {
        let app = build_app();
        let (_, token) = register(&app, "edge").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/deployments",
            Some(&token),
            Some(json!({"image": "registry/screening:latest"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_deploy_requires_credential() {
        let app = build_app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/deployments",
            None,
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_wrongly_typed_coordinate_is_validation_error() {
        let app = build_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/edge-nodes",
            None,
            Some(json!({"name": "x", "address": "10.0.0.1", "latitude": "91", "longitude": 0})),
        )
        .await;
        assert_validation_error(status, &body);

        let (_, nodes) = send(&app, Method::GET, "/api/v1/edge-nodes", None, None).await;
        assert!(nodes.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_malformed_body_is_validation_error() {
        let app = build_app();
        let (status, body) =
            send_raw(&app, Method::POST, "/api/v1/edge-nodes", None, "{\"name\": ").await;
        assert_validation_error(status, &body);
    }

    #[tokio::test]
    async fn test_register_without_json_content_type_is_validation_error() {
        let app = build_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/edge-nodes")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_validation_error(status, &body);
    }

    #[tokio::test]
    async fn test_set_health_unknown_status_is_validation_error() {
        let app = build_app();
        let (id, token) = register(&app, "edge").await;
        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/edge-nodes/{id}/health"),
            Some(&token),
            Some(json!({"status": "sick"})),
        )
        .await;
        assert_validation_error(status, &body);

        let (_, node) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}"),
            None,
            None,
        )
        .await;
        assert_eq!(node["status"], "healthy");
    }

    #[tokio::test]
    async fn test_route_request_malformed_body_is_validation_error() {
        let app = build_app();
        let (id, token) = register(&app, "edge").await;
        let (status, body) = send_raw(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some(&token),
            "not json",
        )
        .await;
        assert_validation_error(status, &body);

        let (_, logs) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}/logs"),
            None,
            None,
        )
        .await;
        assert!(logs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_malformed_body_is_validation_error() {
        let app = build_app();
        let (_, token) = register(&app, "edge").await;
        let (status, body) = send_raw(
            &app,
            Method::POST,
            "/api/v1/deployments",
            Some(&token),
            "{\"image\": ",
        )
        .await;
        assert_validation_error(status, &body);
    }

    #[tokio::test]
    async fn test_route_request_keeps_explicit_null_metadata() {
        let app = build_app();
        let (id, token) = register(&app, "edge").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some(&token),
            Some(json!({"metadata": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/route-request",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, logs) = send(
            &app,
            Method::GET,
            &format!("/api/v1/edge-nodes/{id}/logs"),
            None,
            None,
        )
        .await;
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 2);
        // newest first
        assert_eq!(logs[0]["metadata"], json!({}));
        assert!(logs[1]["metadata"].is_null());
    }
}
