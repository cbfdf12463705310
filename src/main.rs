use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courtify::config::AppConfig;
use courtify::db;
use courtify::routes;
use courtify::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.mock_mode {
        tracing::warn!("mock mode enabled: confirmations are recorded as confirmed_mock");
    }

    let state = Arc::new(AppState::new(conn, config.clone()));
    let app = routes::app(state)?;

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(client_origin = %config.client_origin, "starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
