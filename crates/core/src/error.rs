//! Ledger error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::AccountId;

/// Result type used across the ledger layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// One enum is shared by the Store and the Engine so that a failure raised
/// inside a unit of work (e.g. `InsufficientFunds`) reaches the caller
/// unchanged. Every variant maps onto exactly one [`ErrorKind`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or out-of-range input, rejected before touching the store.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    #[error("owner '{0}' does not exist")]
    OwnerNotFound(String),

    #[error("account {0} is locked")]
    AccountLocked(AccountId),

    #[error("account {0} is already locked")]
    AccountAlreadyLocked(AccountId),

    /// Raised only inside the store's atomic debit check.
    #[error("insufficient funds on account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: i64,
        requested: i64,
    },

    /// The backend rejected a write (uniqueness, foreign key, check constraint).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The caller's deadline elapsed (including while waiting on a row lock).
    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable, transport-independent classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    AccountLocked,
    AccountAlreadyLocked,
    InsufficientFunds,
    ConstraintViolation,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AccountLocked => "account_locked",
            ErrorKind::AccountAlreadyLocked => "account_already_locked",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::AccountNotFound(_) | LedgerError::OwnerNotFound(_) => ErrorKind::NotFound,
            LedgerError::AccountLocked(_) => ErrorKind::AccountLocked,
            LedgerError::AccountAlreadyLocked(_) => ErrorKind::AccountAlreadyLocked,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            LedgerError::Timeout(_) => ErrorKind::Timeout,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Business-rule rejections (as opposed to infrastructure failures).
    pub fn is_business(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::ConstraintViolation | ErrorKind::Timeout | ErrorKind::Internal
        )
    }
}
