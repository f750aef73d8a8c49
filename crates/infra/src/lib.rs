//! Infrastructure layer: ledger store adapters, engine, config, DB wiring.

pub mod config;
pub mod db;
pub mod ledger_engine;
pub mod ledger_store;


pub use config::{ConfigError, DatabaseConfig, LedgerConfig};
pub use ledger_engine::{LedgerEngine, OpenedAccount};
pub use ledger_store::{
    InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, TransferBalances, TransferLocking,
};
