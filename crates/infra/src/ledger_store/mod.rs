//! Ledger Store boundary.
//!
//! The store is the sole writer of account, owner and transaction state. Each
//! balance-mutating primitive is one atomic unit of work: the balance change and
//! its audit-trail record commit together or not at all.

pub mod in_memory;
pub mod postgres;
pub mod schema;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::{PostgresLedgerStore, TransferLocking};
pub use r#trait::{LedgerStore, TransferBalances};
