mod error;
mod middleware;
mod observability;
mod routes;
mod state;
mod validation;

use testimony_infra::{
    config::AppConfig,
    consul::{self, ConsulKvClient},
    logging::init_tracing,
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    init_tracing(&config)?;
    observability::init_metrics()?;

    if config.consul_enabled {
        let client = ConsulKvClient::from_config(&config);
        consul::apply_overrides(&mut config, &client).await?;
    }

    let state = state::AppState::new(config.clone()).await?;
    let app = routes::router(state);

    let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, backend = %config.data_backend, "testimonies api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "server exited");
            err
        })?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
