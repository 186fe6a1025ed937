use db_pool::DbConfig;
use sqlx::{Pool, Postgres};

pub async fn init_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    // Pool tuning comes from the environment; the URL the caller resolved is
    // authoritative
    let cfg = DbConfig::from_env("orders-service")
        .map_err(|e| sqlx::Error::Configuration(e.into()))?
        .with_url(database_url);
    db_pool::create_pool(cfg).await
}
