//! Accounts module (owners, accounts, audit-trail records).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod owner;
pub mod transaction;

pub use account::{Account, AccountState};
pub use owner::{NewOwner, Owner};
pub use transaction::{NewTransaction, TransactionRecord, TransactionType};
