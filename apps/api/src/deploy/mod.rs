//! Deployment trigger for the hosting platform's GraphQL API.
//!
//! The target node is chosen with the same first-healthy policy as request
//! routing and written into the payload as `config.optimal_node` before the
//! `deployImage` mutation is posted.
pub mod handlers;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.fly.io/graphql";
const REQUEST_TIMEOUT_SECS: u64 = 60;

const DEPLOY_MUTATION: &str = r#"
mutation DeployCode($input: DeployImageInput!) {
    deployImage(input: $input) {
        release {
            id
            version
        }
        app {
            name
            status
        }
    }
}
"#;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Deployment is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid deployment payload: {0}")]
    InvalidPayload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    pub target_node: String,
    pub release: Option<Value>,
    pub app: Option<Value>,
}

/// Platform credentials. Both must be present for deployments to run.
#[derive(Clone)]
pub struct DeployCredentials {
    pub api_token: Option<String>,
    pub app_name: Option<String>,
}

#[derive(Clone)]
pub struct DeployClient {
    client: Client,
    api_url: String,
    credentials: DeployCredentials,
}

impl DeployClient {
    pub fn new(api_url: String, credentials: DeployCredentials) -> Result<Self, DeployError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_url,
            credentials,
        })
    }

    /// Posts the deploy mutation for `payload`, targeting `optimal_node`.
    ///
    /// Not retried: a repeated mutation would create a second release.
    pub async fn deploy(
        &self,
        payload: Value,
        optimal_node: &str,
    ) -> Result<DeploymentResult, DeployError> {
        let api_token = self
            .credentials
            .api_token
            .as_deref()
            .ok_or(DeployError::NotConfigured("FLY_API_TOKEN is not set"))?;
        let app_name = self
            .credentials
            .app_name
            .as_deref()
            .ok_or(DeployError::NotConfigured("FLY_APP_NAME is not set"))?;

        let variables = build_variables(app_name, payload, optimal_node)?;
        let body = GraphQlRequest {
            query: DEPLOY_MUTATION,
            variables,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(DeployError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        debug!("Deploy API responded with {} bytes", text.len());

        let parsed: GraphQlResponse = serde_json::from_str(&text)?;
        let result = interpret_response(parsed, optimal_node)?;
        info!(app = app_name, target_node = optimal_node, "Deployment submitted");
        Ok(result)
    }
}

/// Builds `{"input": {"appId": .., ..payload}}` with `config.optimal_node` set.
/// `payload` must be a JSON object (or null, treated as empty).
pub fn build_variables(
    app_name: &str,
    payload: Value,
    optimal_node: &str,
) -> Result<Value, DeployError> {
    let mut input = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(DeployError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let config = input
        .entry("config")
        .or_insert_with(|| Value::Object(Map::new()));
    match config {
        Value::Object(config) => {
            config.insert("optimal_node".to_string(), json!(optimal_node));
        }
        other => {
            return Err(DeployError::InvalidPayload(format!(
                "'config' must be an object, got {}",
                json_kind(other)
            )))
        }
    }

    // appId always comes from configuration
    input.insert("appId".to_string(), json!(app_name));
    Ok(json!({ "input": input }))
}

pub fn interpret_response(
    response: GraphQlResponse,
    optimal_node: &str,
) -> Result<DeploymentResult, DeployError> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(DeployError::GraphQl(messages.join("; ")));
    }

    let deploy = response
        .data
        .and_then(|mut data| data.get_mut("deployImage").map(Value::take))
        .filter(|d| !d.is_null())
        .ok_or_else(|| DeployError::GraphQl("response contained no deployImage data".to_string()))?;

    Ok(DeploymentResult {
        target_node: optimal_node.to_string(),
        release: deploy.get("release").cloned(),
        app: deploy.get("app").cloned(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
