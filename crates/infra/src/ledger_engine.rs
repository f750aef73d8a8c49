//! Ledger Engine (application-level orchestration).
//!
//! The engine enforces the business rules the store does not know about and
//! then delegates to exactly one store primitive:
//!
//! ```text
//! request
//!   ↓
//! 1. Validate input (positive amounts, non-negative opening balance, names)
//!   ↓
//! 2. Fresh read of every involved account (existence + lock state)
//!   ↓
//! 3. Store unit of work (row lock, sufficiency check, write, audit record)
//! ```
//!
//! The engine holds no in-process locks and no cached state; all serialization
//! happens inside the store. Failures are never retried: none of these
//! operations carries an idempotency key, so a retry after an unobserved
//! commit would move money twice.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, instrument, warn};

use bank_accounts::{Account, NewOwner, TransactionRecord};
use bank_core::{AccountId, Amount, Balance, Deadline, ErrorKind, LedgerError, LedgerResult};

use crate::ledger_store::{LedgerStore, TransferBalances};

/// Result of opening an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedAccount {
    pub account_id: AccountId,
    pub balance: Balance,
}

/// Business-rule layer over a [`LedgerStore`].
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: S,
}

impl<S> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    /// Open an account, creating its owner first when no owner with this full
    /// name exists yet.
    #[instrument(skip_all, fields(full_name = %full_name, balance = balance))]
    pub async fn create_account(
        &self,
        full_name: &str,
        citizenship: &str,
        balance: i64,
        deadline: Deadline,
    ) -> LedgerResult<OpenedAccount> {
        let outcome = async {
            let new_owner = NewOwner::new(full_name, citizenship)?;
            let balance = Balance::new(balance)?;

            within(deadline, "create_account", async {
                let owner = match self.store.find_owner(new_owner.full_name()).await {
                    Ok(owner) => owner,
                    Err(LedgerError::OwnerNotFound(_)) => {
                        self.store.create_owner(new_owner.clone()).await?
                    }
                    Err(e) => return Err(e),
                };

                let account = self.store.create_account(owner.id, balance).await?;
                Ok(OpenedAccount {
                    account_id: account.id,
                    balance: account.balance,
                })
            })
            .await
        }
        .await;

        outcome.inspect_err(|e| log_failure("create_account", e))
    }

    #[instrument(skip_all, fields(account_id = %account_id, amount = amount))]
    pub async fn top_up(
        &self,
        account_id: AccountId,
        amount: i64,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        let outcome = async {
            let amount = Amount::new(amount)?;
            within(deadline, "top_up", async {
                self.active_account(account_id).await?;
                self.store.top_up(account_id, amount, deadline).await
            })
            .await
        }
        .await;

        outcome.inspect_err(|e| log_failure("top_up", e))
    }

    #[instrument(skip_all, fields(account_id = %account_id, amount = amount))]
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: i64,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        let outcome = async {
            let amount = Amount::new(amount)?;
            within(deadline, "withdraw", async {
                self.active_account(account_id).await?;
                self.store.withdraw(account_id, amount, deadline).await
            })
            .await
        }
        .await;

        outcome.inspect_err(|e| log_failure("withdraw", e))
    }

    /// Move funds between two accounts. The debit side is validated before the
    /// credit side, so when both are invalid the debit failure is reported.
    #[instrument(skip_all, fields(debit = %debit, credit = %credit, amount = amount))]
    pub async fn transfer(
        &self,
        debit: AccountId,
        credit: AccountId,
        amount: i64,
        deadline: Deadline,
    ) -> LedgerResult<TransferBalances> {
        let outcome = async {
            let amount = Amount::new(amount)?;
            if debit == credit {
                return Err(LedgerError::validation(
                    "debit and credit accounts must differ",
                ));
            }

            within(deadline, "transfer", async {
                self.active_account(debit).await?;
                self.active_account(credit).await?;
                self.store.transfer(debit, credit, amount, deadline).await
            })
            .await
        }
        .await;

        outcome.inspect_err(|e| log_failure("transfer", e))
    }

    /// Lock an account. Locking is one-way; locking twice is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn lock(&self, account_id: AccountId, deadline: Deadline) -> LedgerResult<()> {
        let outcome = within(deadline, "lock", async {
            let account = self.store.get_account(account_id).await?;
            account.ensure_lockable()?;
            self.store.lock_account(account_id).await
        })
        .await;

        outcome.inspect_err(|e| log_failure("lock", e))
    }

    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn account(&self, account_id: AccountId, deadline: Deadline) -> LedgerResult<Account> {
        within(deadline, "account", self.store.get_account(account_id))
            .await
            .inspect_err(|e| log_failure("account", e))
    }

    /// Audit trail of an account, oldest record first.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn history(
        &self,
        account_id: AccountId,
        deadline: Deadline,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let outcome = within(deadline, "history", async {
            self.store.get_account(account_id).await?;
            self.store.transactions(account_id).await
        })
        .await;

        outcome.inspect_err(|e| log_failure("history", e))
    }

    async fn active_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        let account = self.store.get_account(account_id).await?;
        account.ensure_active()?;
        Ok(account)
    }
}

/// Run `fut` within the time left before `deadline`.
///
/// An elapsed timer drops `fut`; an in-flight store unit of work is rolled back
/// when its transaction handle is dropped.
async fn within<T, F>(deadline: Deadline, op: &'static str, fut: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match deadline.remaining() {
        None => fut.await,
        Some(remaining) if remaining.is_zero() => Err(LedgerError::timeout(format!(
            "{op}: deadline elapsed before start"
        ))),
        Some(remaining) => tokio::time::timeout(remaining, fut)
            .await
            .map_err(|_| LedgerError::timeout(format!("{op}: deadline elapsed")))?,
    }
}

fn log_failure(op: &'static str, err: &LedgerError) {
    match err.kind() {
        ErrorKind::Internal | ErrorKind::ConstraintViolation => {
            error!(op, kind = %err.kind(), error = %err, "ledger operation failed")
        }
        _ if err.is_business() => {
            warn!(op, kind = %err.kind(), error = %err, "ledger operation rejected")
        }
        _ => warn!(op, kind = %err.kind(), error = %err, "ledger operation timed out"),
    }
}
