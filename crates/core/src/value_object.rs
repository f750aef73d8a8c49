//! Value objects: equality by value, not identity.
//!
//! Money is carried as a signed count of minor currency units (`i64`). The
//! two wrappers below encode the only ranges the ledger accepts:
//!
//! - [`Amount`]: a strictly positive quantity moved by a top-up, withdrawal or transfer
//! - [`Balance`]: a non-negative account balance

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Strictly positive amount of minor currency units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value <= 0 {
            return Err(LedgerError::validation(format!(
                "incorrect or empty amount {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl ValueObject for Amount {}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Non-negative account balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Balance(i64);

impl Balance {
    pub const ZERO: Balance = Balance(0);

    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value < 0 {
            return Err(LedgerError::validation(format!("incorrect balance {value}")));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Whether this balance can cover a debit of `amount`.
    pub fn covers(&self, amount: Amount) -> bool {
        amount.get() <= self.0
    }

    /// Balance after crediting `amount`. Fails only on `i64` overflow.
    pub fn credit(self, amount: Amount) -> Result<Self, LedgerError> {
        self.0
            .checked_add(amount.get())
            .map(Self)
            .ok_or_else(|| LedgerError::validation("balance overflow"))
    }

    /// Balance after debiting `amount`, or `None` when it would go negative.
    pub fn debit(self, amount: Amount) -> Option<Self> {
        if !self.covers(amount) {
            return None;
        }
        Some(Self(self.0 - amount.get()))
    }
}

impl ValueObject for Balance {}

impl TryFrom<i64> for Balance {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Balance> for i64 {
    fn from(value: Balance) -> Self {
        value.0
    }
}

impl core::fmt::Display for Balance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
