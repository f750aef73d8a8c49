//! Database adapters (connection pool wiring).

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use bank_core::LedgerResult;

use crate::config::DatabaseConfig;
use crate::ledger_store::postgres::map_sqlx_error;

/// Open the Postgres connection pool shared by every ledger operation.
#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(config: &DatabaseConfig) -> LedgerResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    info!("connected to postgres");
    Ok(pool)
}
