use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::deploy::DEFAULT_API_URL;
use crate::registry::HealthUpdatePolicy;

/// Where nodes and request logs are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!(
                "NODE_STORE must be 'postgres' or 'memory', got '{other}'"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    /// Required for the Postgres backend.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub health_policy: HealthUpdatePolicy,
    pub fly_api_url: String,
    pub fly_api_token: Option<String>,
    pub fly_app_name: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store: StoreBackend = optional_env("NODE_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;
        let database_url = match store {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        Ok(Config {
            store,
            database_url,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            health_policy: optional_env("HEALTH_UPDATE_POLICY")
                .map(|v| v.parse::<HealthUpdatePolicy>().map_err(|e| anyhow!(e)))
                .transpose()
                .context("HEALTH_UPDATE_POLICY is invalid")?
                .unwrap_or_default(),
            fly_api_url: optional_env("FLY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            fly_api_token: optional_env("FLY_API_TOKEN"),
            fly_app_name: optional_env("FLY_APP_NAME"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
