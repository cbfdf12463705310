use tracing_subscriber::EnvFilter;

use courtify::config::AppConfig;
use courtify::db;
use courtify::services::catalog;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let mut conn = db::init_db(&config.database_url)?;

    let inserted = catalog::seed_default_services(&mut conn)?;
    tracing::info!(database = %config.database_url, inserted, "seed complete");

    Ok(())
}
