use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use bank_accounts::{Account, NewOwner, NewTransaction, Owner, TransactionRecord};
use bank_core::{
    AccountId, Amount, Balance, Deadline, Entity, LedgerError, LedgerResult, OwnerId, TransactionId,
};

use super::r#trait::{LedgerStore, TransferBalances};

#[derive(Debug, Default)]
struct Tables {
    owners: Vec<Owner>,
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<TransactionRecord>,
    next_owner_id: i64,
    next_account_id: i64,
    next_transaction_id: i64,
}

impl Tables {
    fn account(&self, id: AccountId) -> LedgerResult<&Account> {
        self.accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))
    }

    fn account_mut(&mut self, id: AccountId) -> LedgerResult<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn append(&mut self, tx: NewTransaction) {
        self.next_transaction_id += 1;
        let record = tx.into_record(TransactionId::from_raw(self.next_transaction_id), Utc::now());
        self.transactions.push(record);
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Every unit of work runs under a single mutex
/// acquisition, so all reads, checks and writes of one operation are atomic and
/// concurrent debits against the same account serialize.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> LedgerResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| LedgerError::internal("lock poisoned"))
    }

    fn ensure_time_left(deadline: Deadline, op: &str) -> LedgerResult<()> {
        if deadline.is_expired() {
            return Err(LedgerError::timeout(format!("{op}: deadline elapsed")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_owner(&self, owner: NewOwner) -> LedgerResult<Owner> {
        let mut tables = self.tables()?;
        tables.next_owner_id += 1;
        let owner = owner.into_owner(OwnerId::from_raw(tables.next_owner_id));
        tables.owners.push(owner.clone());
        Ok(owner)
    }

    async fn find_owner(&self, full_name: &str) -> LedgerResult<Owner> {
        let tables = self.tables()?;
        tables
            .owners
            .iter()
            .find(|o| o.full_name == full_name)
            .cloned()
            .ok_or_else(|| LedgerError::OwnerNotFound(full_name.to_string()))
    }

    async fn create_account(&self, owner_id: OwnerId, balance: Balance) -> LedgerResult<Account> {
        let mut tables = self.tables()?;
        if !tables.owners.iter().any(|o| o.id == owner_id) {
            return Err(LedgerError::constraint(format!(
                "account.owner_id references unknown owner {owner_id}"
            )));
        }

        tables.next_account_id += 1;
        let account = Account::open(AccountId::from_raw(tables.next_account_id), owner_id, balance);
        tables.accounts.insert(account.id(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.tables()?.account(id).cloned()
    }

    async fn lock_account(&self, id: AccountId) -> LedgerResult<()> {
        self.tables()?.account_mut(id)?.lock();
        Ok(())
    }

    async fn top_up(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        Self::ensure_time_left(deadline, "top_up")?;
        let mut tables = self.tables()?;

        let balance = tables.account(account_id)?.credited(amount)?;
        tables.account_mut(account_id)?.balance = balance;
        tables.append(NewTransaction::top_up(account_id, amount));

        Ok(balance)
    }

    async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        Self::ensure_time_left(deadline, "withdraw")?;
        let mut tables = self.tables()?;

        let balance = tables.account(account_id)?.debited(amount)?;
        tables.account_mut(account_id)?.balance = balance;
        tables.append(NewTransaction::withdraw(account_id, amount));

        Ok(balance)
    }

    async fn transfer(
        &self,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<TransferBalances> {
        Self::ensure_time_left(deadline, "transfer")?;
        if debit == credit {
            return Err(LedgerError::validation(
                "debit and credit accounts must differ",
            ));
        }

        let mut tables = self.tables()?;

        // Compute both sides before writing either one.
        let debit_balance = tables.account(debit)?.debited(amount)?;
        let credit_balance = tables.account(credit)?.credited(amount)?;

        tables.account_mut(debit)?.balance = debit_balance;
        tables.account_mut(credit)?.balance = credit_balance;
        tables.append(NewTransaction::transfer(debit, credit, amount));

        Ok(TransferBalances {
            debit: debit_balance,
            credit: credit_balance,
        })
    }

    async fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<TransactionRecord>> {
        let tables = self.tables()?;
        tables.account(account_id)?;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.involves(account_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_accounts::TransactionType;

    fn amount(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    async fn open(store: &InMemoryLedgerStore, name: &str, balance: i64) -> Account {
        let owner = store
            .create_owner(NewOwner::new(name, "RU").unwrap())
            .await
            .unwrap();
        store
            .create_account(owner.id, Balance::new(balance).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_account_requires_existing_owner() {
        let store = InMemoryLedgerStore::new();
        let err = store
            .create_account(OwnerId::from_raw(99), Balance::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn find_owner_by_full_name() {
        let store = InMemoryLedgerStore::new();
        let created = store
            .create_owner(NewOwner::new("Ivan Ivanov", "RU").unwrap())
            .await
            .unwrap();

        assert_eq!(store.find_owner("Ivan Ivanov").await.unwrap(), created);
        assert!(matches!(
            store.find_owner("Petr Petrov").await,
            Err(LedgerError::OwnerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_withdraw_leaves_no_trace() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "A", 250).await;

        let err = store
            .withdraw(a.id, amount(300), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        assert_eq!(store.get_account(a.id).await.unwrap().balance.get(), 250);
        assert!(store.transactions(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transfer_to_missing_credit_account_changes_nothing() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "A", 250).await;

        let err = store
            .transfer(a.id, AccountId::from_raw(404), amount(50), Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound(AccountId::from_raw(404)));
        assert_eq!(store.get_account(a.id).await.unwrap().balance.get(), 250);
        assert!(store.transactions(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_rechecks_lock_flag_inside_the_unit_of_work() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "A", 100).await;
        store.lock_account(a.id).await.unwrap();
        // Locking twice is a no-op at the storage layer.
        store.lock_account(a.id).await.unwrap();

        let err = store
            .top_up(a.id, amount(10), Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AccountLocked(a.id));
    }

    #[tokio::test]
    async fn transfer_appends_one_record_spanning_both_accounts() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "A", 250).await;
        let b = open(&store, "B", 250).await;

        let balances = store
            .transfer(a.id, b.id, amount(50), Deadline::none())
            .await
            .unwrap();
        assert_eq!(balances.debit.get(), 200);
        assert_eq!(balances.credit.get(), 300);

        let a_history = store.transactions(a.id).await.unwrap();
        let b_history = store.transactions(b.id).await.unwrap();
        assert_eq!(a_history.len(), 1);
        assert_eq!(a_history, b_history);
        assert_eq!(a_history[0].kind, TransactionType::Transfer);
        assert_eq!(a_history[0].account_id, a.id);
        assert_eq!(a_history[0].participating_account_id, Some(b.id));
    }

    #[tokio::test]
    async fn expired_deadline_is_rejected_before_any_write() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "A", 100).await;
        let past = Deadline::at(std::time::Instant::now() - std::time::Duration::from_millis(1));

        let err = store.top_up(a.id, amount(10), past).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert_eq!(store.get_account(a.id).await.unwrap().balance.get(), 100);
    }
}
