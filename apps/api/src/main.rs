mod auth;
mod config;
mod db;
mod deploy;
mod errors;
mod extract;
mod models;
mod registry;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::deploy::{DeployClient, DeployCredentials};
use crate::registry::memory::MemoryNodeStore;
use crate::registry::postgres::PgNodeStore;
use crate::registry::store::NodeStore;
use crate::registry::NodeRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting edge registry v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn NodeStore> = match config.store {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            Arc::new(PgNodeStore::new(create_pool(url).await?))
        }
        StoreBackend::Memory => {
            info!("Using in-memory node store; registrations are lost on restart");
            Arc::new(MemoryNodeStore::new())
        }
    };
    let registry = NodeRegistry::new(store, config.health_policy);
    info!("Health update policy: {:?}", config.health_policy);

    let deployer = DeployClient::new(
        config.fly_api_url.clone(),
        DeployCredentials {
            api_token: config.fly_api_token.clone(),
            app_name: config.fly_app_name.clone(),
        },
    )?;
    if config.fly_api_token.is_none() || config.fly_app_name.is_none() {
        info!("FLY_API_TOKEN/FLY_APP_NAME not set; deployments are disabled");
    }

    let state = AppState { registry, deployer };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
