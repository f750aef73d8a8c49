//! Strongly-typed identifiers used across the ledger.
//!
//! Identifiers are backend-assigned positive integers (`BIGSERIAL`). Values
//! coming from callers go through `parse`, values read back from the store go
//! through `from_raw`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Identifier of an owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(i64);

/// Identifier of an account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

/// Identifier of an audit-trail transaction record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Validate a caller-supplied identifier (must be positive).
            pub fn parse(value: i64) -> Result<Self, LedgerError> {
                if value <= 0 {
                    return Err(LedgerError::validation(format!(
                        "{}: incorrect or empty id {}",
                        $name, value
                    )));
                }
                Ok(Self(value))
            }

            /// Wrap an identifier assigned by the backend.
            pub fn from_raw(value: i64) -> Self {
                Self(value)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = i64::from_str(s.trim())
                    .map_err(|e| LedgerError::validation(format!("{}: {}", $name, e)))?;
                Self::parse(value)
            }
        }
    };
}

impl_int_newtype!(OwnerId, "OwnerId");
impl_int_newtype!(AccountId, "AccountId");
impl_int_newtype!(TransactionId, "TransactionId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_non_positive_ids() {
        assert!(AccountId::parse(0).is_err());
        assert!(AccountId::parse(-5).is_err());
        assert_eq!(AccountId::parse(42).unwrap().get(), 42);
    }

    #[test]
    fn from_str_trims_and_validates() {
        let id: OwnerId = " 12 ".parse().unwrap();
        assert_eq!(id.get(), 12);

        let err = "abc".parse::<OwnerId>().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
