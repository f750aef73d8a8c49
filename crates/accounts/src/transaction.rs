use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bank_core::{AccountId, Amount, LedgerError, TransactionId};

/// Kind of balance mutation recorded in the audit trail.
///
/// Persisted as a small integer: TopUp=1, Withdraw=2, Transfer=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TopUp,
    Withdraw,
    Transfer,
}

impl TransactionType {
    pub fn code(&self) -> i16 {
        match self {
            TransactionType::TopUp => 1,
            TransactionType::Withdraw => 2,
            TransactionType::Transfer => 3,
        }
    }

    pub fn from_code(code: i16) -> Result<Self, LedgerError> {
        match code {
            1 => Ok(TransactionType::TopUp),
            2 => Ok(TransactionType::Withdraw),
            3 => Ok(TransactionType::Transfer),
            other => Err(LedgerError::internal(format!(
                "unknown transaction type code {other}"
            ))),
        }
    }
}

/// A record about to be appended to the audit trail.
///
/// For a transfer, `account_id` is the debited account and
/// `participating_account_id` the credited one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub participating_account_id: Option<AccountId>,
    pub kind: TransactionType,
    pub amount: Amount,
}

impl NewTransaction {
    pub fn top_up(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            participating_account_id: None,
            kind: TransactionType::TopUp,
            amount,
        }
    }

    pub fn withdraw(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            participating_account_id: None,
            kind: TransactionType::Withdraw,
            amount,
        }
    }

    pub fn transfer(debit: AccountId, credit: AccountId, amount: Amount) -> Self {
        Self {
            account_id: debit,
            participating_account_id: Some(credit),
            kind: TransactionType::Transfer,
            amount,
        }
    }

    pub fn into_record(self, id: TransactionId, occurred_at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            account_id: self.account_id,
            participating_account_id: self.participating_account_id,
            kind: self.kind,
            amount: self.amount,
            occurred_at,
        }
    }
}

/// Append-only audit-trail entry. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub participating_account_id: Option<AccountId>,
    pub kind: TransactionType,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether the record touches `account` on either side.
    pub fn involves(&self, account: AccountId) -> bool {
        self.account_id == account || self.participating_account_id == Some(account)
    }

    /// Signed effect of this record on `account`'s balance.
    pub fn delta_for(&self, account: AccountId) -> i64 {
        let amount = self.amount.get();
        match self.kind {
            TransactionType::TopUp if self.account_id == account => amount,
            TransactionType::Withdraw if self.account_id == account => -amount,
            TransactionType::Transfer if self.account_id == account => -amount,
            TransactionType::Transfer if self.participating_account_id == Some(account) => amount,
            _ => 0,
        }
    }
}
