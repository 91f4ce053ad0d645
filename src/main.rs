use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sarthi_orchestrator::{AppConfig, Deployer};

mod api;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub deployer: Arc<Deployer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let filter = if config.is_local() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,axum=info,reqwest=info,hyper_util=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let deployer = Deployer::new(&config)?;

    let state = AppState {
        config,
        deployer: Arc::new(deployer),
    };

    let app = Router::new()
        .merge(api::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
