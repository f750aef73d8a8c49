//! `bank-core` — ledger foundation building blocks.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): typed
//! identifiers, money value objects, deadlines and the ledger error taxonomy.

pub mod deadline;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use deadline::{Deadline, MAX_TIMEOUT_MS};
pub use entity::Entity;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use id::{AccountId, OwnerId, TransactionId};
pub use value_object::{Amount, Balance, ValueObject};
