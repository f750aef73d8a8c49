use serde::{Deserialize, Serialize};

use bank_core::{AccountId, Amount, Balance, Entity, LedgerError, OwnerId};

/// Lifecycle state of an account.
///
/// `Active -> Locked` is the only transition; `Locked` is terminal and accepts
/// no further balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    Active,
    Locked,
}

/// Balance-bearing account owned by exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: OwnerId,
    pub balance: Balance,
    pub is_locked: bool,
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> AccountId {
        self.id
    }
}

impl Account {
    /// Freshly opened account (never locked).
    pub fn open(id: AccountId, owner_id: OwnerId, balance: Balance) -> Self {
        Self {
            id,
            owner_id,
            balance,
            is_locked: false,
        }
    }

    pub fn state(&self) -> AccountState {
        if self.is_locked {
            AccountState::Locked
        } else {
            AccountState::Active
        }
    }

    /// Guard for every balance-mutating operation.
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        match self.state() {
            AccountState::Active => Ok(()),
            AccountState::Locked => Err(LedgerError::AccountLocked(self.id)),
        }
    }

    /// Guard for the lock transition.
    pub fn ensure_lockable(&self) -> Result<(), LedgerError> {
        match self.state() {
            AccountState::Active => Ok(()),
            AccountState::Locked => Err(LedgerError::AccountAlreadyLocked(self.id)),
        }
    }

    pub fn ensure_covers(&self, amount: Amount) -> Result<(), LedgerError> {
        if self.balance.covers(amount) {
            return Ok(());
        }
        Err(LedgerError::InsufficientFunds {
            account_id: self.id,
            balance: self.balance.get(),
            requested: amount.get(),
        })
    }

    /// Balance after a credit, without mutating the account.
    pub fn credited(&self, amount: Amount) -> Result<Balance, LedgerError> {
        self.ensure_active()?;
        self.balance.credit(amount)
    }

    /// Balance after a debit, without mutating the account.
    pub fn debited(&self, amount: Amount) -> Result<Balance, LedgerError> {
        self.ensure_active()?;
        self.ensure_covers(amount)?;
        self.balance
            .debit(amount)
            .ok_or_else(|| LedgerError::internal("debit underflow after coverage check"))
    }

    /// Storage-level lock: unconditional and idempotent.
    pub fn lock(&mut self) {
        self.is_locked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn account(balance: i64) -> Account {
        Account::open(
            AccountId::from_raw(1),
            OwnerId::from_raw(1),
            Balance::new(balance).unwrap(),
        )
    }

    fn amount(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn opened_account_is_active() {
        let a = account(500);
        assert_eq!(a.state(), AccountState::Active);
        assert!(a.ensure_active().is_ok());
        assert!(a.ensure_lockable().is_ok());
    }

    #[test]
    fn lock_is_one_way_and_idempotent_at_storage_level() {
        let mut a = account(500);
        a.lock();
        a.lock();

        assert_eq!(a.state(), AccountState::Locked);
        assert_eq!(a.ensure_active(), Err(LedgerError::AccountLocked(a.id)));
        assert_eq!(a.ensure_lockable(), Err(LedgerError::AccountAlreadyLocked(a.id)));
        assert_eq!(a.balance.get(), 500);
    }

    #[test]
    fn debit_over_balance_is_insufficient_funds() {
        let a = account(250);
        let err = a.debited(amount(300)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account_id: a.id,
                balance: 250,
                requested: 300,
            }
        );
    }

    #[test]
    fn credit_and_debit_compute_new_balance() {
        let a = account(500);
        assert_eq!(a.credited(amount(50)).unwrap().get(), 550);
        assert_eq!(a.debited(amount(500)).unwrap().get(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: once locked, neither credits nor debits are accepted,
        /// whatever the amount.
        #[test]
        fn locked_account_rejects_every_mutation(
            balance in 0i64..1_000_000,
            amounts in prop::collection::vec(1i64..1_000_000, 1..10)
        ) {
            let mut a = account(balance);
            a.lock();

            for v in amounts {
                prop_assert_eq!(a.credited(amount(v)), Err(LedgerError::AccountLocked(a.id)));
                prop_assert_eq!(a.debited(amount(v)), Err(LedgerError::AccountLocked(a.id)));
            }
            prop_assert_eq!(a.balance.get(), balance);
        }
    }
}
