use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use bank_accounts::{Account, NewOwner, Owner, TransactionRecord};
use bank_core::{AccountId, Amount, Balance, Deadline, LedgerResult, OwnerId};

/// Resulting balances of both sides of a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBalances {
    pub debit: Balance,
    pub credit: Balance,
}

/// Durable, atomic persistence of owners, accounts and the audit trail.
///
/// ## Unit-of-work semantics
///
/// `top_up`, `withdraw` and `transfer` each run as one atomic unit of work:
/// - the debit side is read under an exclusive row lock before its balance is checked
/// - a failed check (`InsufficientFunds`, `AccountLocked`, ...) aborts the unit with no effect
/// - exactly one `TransactionRecord` is appended per committed mutation
///
/// Implementations re-check the lock flag of every mutated row inside the unit
/// of work, so a concurrently committed lock still rejects the mutation.
///
/// ## Deadlines
///
/// Mutating primitives receive the caller's [`Deadline`]. A lock wait that
/// outlives it fails with `LedgerError::Timeout` and rolls the unit back.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - never let a committed balance go negative
/// - never write a transaction record without its balance change (and vice versa)
/// - treat `lock_account` as idempotent (the "already locked" rejection is the engine's)
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert an owner and return the full row.
    async fn create_owner(&self, owner: NewOwner) -> LedgerResult<Owner>;

    /// Look an owner up by full name (`OwnerNotFound` when absent).
    async fn find_owner(&self, full_name: &str) -> LedgerResult<Owner>;

    /// Open an unlocked account (`ConstraintViolation` on an unknown owner).
    async fn create_account(&self, owner_id: OwnerId, balance: Balance) -> LedgerResult<Account>;

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account>;

    /// Unconditionally set the lock flag.
    async fn lock_account(&self, id: AccountId) -> LedgerResult<()>;

    /// Credit `amount` and append a `TopUp` record; returns the new balance.
    async fn top_up(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance>;

    /// Debit `amount` under an exclusive row lock and append a `Withdraw` record.
    async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance>;

    /// Move `amount` from `debit` to `credit` and append one `Transfer` record.
    async fn transfer(
        &self,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<TransferBalances>;

    /// Audit trail of an account (either side), oldest first.
    async fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<TransactionRecord>>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn create_owner(&self, owner: NewOwner) -> LedgerResult<Owner> {
        (**self).create_owner(owner).await
    }

    async fn find_owner(&self, full_name: &str) -> LedgerResult<Owner> {
        (**self).find_owner(full_name).await
    }

    async fn create_account(&self, owner_id: OwnerId, balance: Balance) -> LedgerResult<Account> {
        (**self).create_account(owner_id, balance).await
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        (**self).get_account(id).await
    }

    async fn lock_account(&self, id: AccountId) -> LedgerResult<()> {
        (**self).lock_account(id).await
    }

    async fn top_up(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        (**self).top_up(account_id, amount, deadline).await
    }

    async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        (**self).withdraw(account_id, amount, deadline).await
    }

    async fn transfer(
        &self,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<TransferBalances> {
        (**self).transfer(debit, credit, amount, deadline).await
    }

    async fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<TransactionRecord>> {
        (**self).transactions(account_id).await
    }
}
