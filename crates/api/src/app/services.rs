//! Ledger wiring: picks the store backend from configuration and builds the
//! engine on top of it.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use bank_core::LedgerResult;
use bank_infra::ledger_store::schema::apply_schema;
use bank_infra::{db, InMemoryLedgerStore, LedgerConfig, LedgerEngine, LedgerStore, PostgresLedgerStore};

/// Engine over a type-erased store, so both backends share one router.
pub type Engine = LedgerEngine<Arc<dyn LedgerStore>>;

pub struct AppServices {
    engine: Engine,
    default_deadline: Duration,
    postgres: Option<Arc<PostgresLedgerStore>>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, default_deadline: Duration) -> Self {
        Self {
            engine: LedgerEngine::new(store),
            default_deadline,
            postgres: None,
        }
    }

    pub fn in_memory(default_deadline: Duration) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), default_deadline)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Release backend resources (connection pool).
    pub async fn shutdown(&self) {
        if let Some(store) = &self.postgres {
            store.close().await;
            info!("postgres pool closed");
        }
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// the in-memory store otherwise.
pub async fn build_services(config: &LedgerConfig) -> LedgerResult<AppServices> {
    let Some(database) = &config.database else {
        info!("DATABASE_URL not set; using in-memory ledger store");
        return Ok(AppServices::in_memory(config.default_deadline));
    };

    let pool = db::connect(database).await?;
    apply_schema(&pool).await?;

    let store = Arc::new(
        PostgresLedgerStore::new(pool).with_transfer_locking(config.transfer_locking),
    );
    info!(transfer_locking = ?config.transfer_locking, "using postgres ledger store");

    Ok(AppServices {
        engine: LedgerEngine::new(store.clone() as Arc<dyn LedgerStore>),
        default_deadline: config.default_deadline,
        postgres: Some(store),
    })
}
