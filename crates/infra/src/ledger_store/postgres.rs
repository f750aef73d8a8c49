//! Postgres-backed ledger store implementation.
//!
//! Every balance-mutating primitive runs in one SQL transaction. The debit side
//! of a withdrawal or transfer is read with `SELECT ... FOR UPDATE`, so two
//! concurrent debits against the same account serialize on the row lock and
//! the second one observes the first one's committed balance.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `ConstraintViolation` | Duplicate key |
//! | Database (foreign key violation) | `23503` | `ConstraintViolation` | Unknown owner/account id |
//! | Database (check constraint violation) | `23514` | `ConstraintViolation` | Negative balance, non-positive amount |
//! | Database (numeric value out of range) | `22003` | `Validation` | Credit would overflow a `BIGINT` balance |
//! | Database (lock not available) | `55P03` | `Timeout` | `lock_timeout` derived from the deadline elapsed |
//! | Database (query canceled) | `57014` | `Timeout` | Statement cancelled |
//! | PoolTimedOut | N/A | `Timeout` | No connection available in time |
//! | Other | N/A | `Internal` | Network errors, deadlocks, connection failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync` and can be shared across tasks.
//! All operations use the SQLx connection pool which handles connection management.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use bank_accounts::{Account, NewOwner, NewTransaction, Owner, TransactionRecord, TransactionType};
use bank_core::{
    AccountId, Amount, Balance, Deadline, LedgerError, LedgerResult, OwnerId, TransactionId,
};

use super::r#trait::{LedgerStore, TransferBalances};

/// Row-lock policy for transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferLocking {
    /// Lock both rows in ascending id order before mutating either balance.
    /// Opposite-direction transfers between the same pair of accounts queue
    /// on the lower id and never deadlock.
    #[default]
    Ordered,
    /// Lock only the debit row before reading it; the credit row is updated
    /// additively. The credit `UPDATE` still takes a row lock, so concurrent
    /// A→B and B→A transfers can fail with `40P01` and surface as `Internal`.
    DebitOnly,
}

impl FromStr for TransferLocking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit_only" | "debit-only" => Ok(TransferLocking::DebitOnly),
            "ordered" => Ok(TransferLocking::Ordered),
            other => Err(format!(
                "unknown transfer locking '{other}' (expected debit_only or ordered)"
            )),
        }
    }
}

/// Postgres-backed ledger store.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    transfer_locking: TransferLocking,
}

impl PostgresLedgerStore {
    /// Create a new PostgresLedgerStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            transfer_locking: TransferLocking::default(),
        }
    }

    pub fn with_transfer_locking(mut self, transfer_locking: TransferLocking) -> Self {
        self.transfer_locking = transfer_locking;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Release every pooled connection (shutdown path).
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Begin a unit of work whose row-lock waits are bounded by `deadline`.
    async fn begin(
        &self,
        op: &'static str,
        deadline: Deadline,
    ) -> LedgerResult<Transaction<'static, Postgres>> {
        if deadline.is_expired() {
            return Err(LedgerError::timeout(format!("{op}: deadline elapsed")));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(op, e))?;

        if let Some(remaining) = deadline.remaining() {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(lock_timeout_setting(remaining))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(op, e))?;
        }

        Ok(tx)
    }
}

/// `lock_timeout` value for the time left; Postgres caps the setting at
/// `i32::MAX` milliseconds.
fn lock_timeout_setting(remaining: Duration) -> String {
    let millis = remaining.as_millis().clamp(1, i32::MAX as u128);
    format!("{millis}ms")
}

/// Commit on success, roll back on failure; the original failure wins.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    op: &'static str,
    outcome: LedgerResult<T>,
) -> LedgerResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| map_sqlx_error(op, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(op, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Read an account row under an exclusive lock.
async fn lock_account_row(
    tx: &mut Transaction<'static, Postgres>,
    id: AccountId,
) -> LedgerResult<Account> {
    let row = sqlx::query(
        r#"
        SELECT id, owner_id, balance, is_locked
        FROM account
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.get())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_account_row", e))?;

    match row {
        Some(row) => AccountRow::from_row(&row)
            .map_err(|e| LedgerError::internal(format!("failed to read account row: {e}")))?
            .try_into(),
        None => Err(LedgerError::AccountNotFound(id)),
    }
}

/// Additive credit guarded by the lock flag.
async fn credit_unlocked(
    tx: &mut Transaction<'static, Postgres>,
    id: AccountId,
    amount: Amount,
) -> LedgerResult<Balance> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE account
        SET balance = balance + $1
        WHERE id = $2 AND NOT is_locked
        RETURNING balance
        "#,
    )
    .bind(amount.get())
    .bind(id.get())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("credit", e))?;

    if let Some(balance) = balance {
        return Balance::new(balance);
    }

    // Nothing updated: tell a locked account apart from a missing one.
    let locked: Option<bool> = sqlx::query_scalar("SELECT is_locked FROM account WHERE id = $1")
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("credit", e))?;

    match locked {
        Some(true) => Err(LedgerError::AccountLocked(id)),
        Some(false) => Err(LedgerError::internal(format!(
            "credit of account {id} affected no rows"
        ))),
        None => Err(LedgerError::AccountNotFound(id)),
    }
}

/// Decrement a balance previously read (and checked) under `FOR UPDATE`.
async fn debit_locked(
    tx: &mut Transaction<'static, Postgres>,
    id: AccountId,
    amount: Amount,
) -> LedgerResult<Balance> {
    let balance: i64 = sqlx::query_scalar(
        r#"
        UPDATE account
        SET balance = balance - $1
        WHERE id = $2
        RETURNING balance
        "#,
    )
    .bind(amount.get())
    .bind(id.get())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("debit", e))?;

    Balance::new(balance)
}

async fn insert_transaction(
    tx: &mut Transaction<'static, Postgres>,
    record: NewTransaction,
) -> LedgerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction (
            account_id,
            participating_account_id,
            transaction_type,
            amount,
            occurred_at
        )
        VALUES ($1, $2, $3, $4, NOW())
        "#,
    )
    .bind(record.account_id.get())
    .bind(record.participating_account_id.map(|id| id.get()))
    .bind(record.kind.code())
    .bind(record.amount.get())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;

    Ok(())
}

impl PostgresLedgerStore {
    async fn transfer_debit_only(
        tx: &mut Transaction<'static, Postgres>,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
    ) -> LedgerResult<TransferBalances> {
        let debit_account = lock_account_row(tx, debit).await?;
        debit_account.ensure_active()?;
        debit_account.ensure_covers(amount)?;

        let debit_balance = debit_locked(tx, debit, amount).await?;
        let credit_balance = credit_unlocked(tx, credit, amount).await?;
        insert_transaction(tx, NewTransaction::transfer(debit, credit, amount)).await?;

        Ok(TransferBalances {
            debit: debit_balance,
            credit: credit_balance,
        })
    }

    async fn transfer_ordered(
        tx: &mut Transaction<'static, Postgres>,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
    ) -> LedgerResult<TransferBalances> {
        let ids = [debit.get().min(credit.get()), debit.get().max(credit.get())];
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, balance, is_locked
            FROM account
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_transfer_rows", e))?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            let account: Account = AccountRow::from_row(&row)
                .map_err(|e| LedgerError::internal(format!("failed to read account row: {e}")))?
                .try_into()?;
            accounts.push(account);
        }

        let find = |id: AccountId| {
            accounts
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or(LedgerError::AccountNotFound(id))
        };
        let debit_account = find(debit)?;
        let credit_account = find(credit)?;

        let debit_balance = debit_account.debited(amount)?;
        let credit_balance = credit_account.credited(amount)?;

        for (id, balance) in [(debit, debit_balance), (credit, credit_balance)] {
            sqlx::query("UPDATE account SET balance = $1 WHERE id = $2")
                .bind(balance.get())
                .bind(id.get())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("apply_transfer", e))?;
        }
        insert_transaction(tx, NewTransaction::transfer(debit, credit, amount)).await?;

        Ok(TransferBalances {
            debit: debit_balance,
            credit: credit_balance,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip_all, fields(full_name = %owner.full_name()), err)]
    async fn create_owner(&self, owner: NewOwner) -> LedgerResult<Owner> {
        let row = sqlx::query(
            r#"
            INSERT INTO owner (full_name, citizenship)
            VALUES ($1, $2)
            RETURNING id, full_name, citizenship
            "#,
        )
        .bind(owner.full_name())
        .bind(owner.citizenship())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_owner", e))?;

        let row = OwnerRow::from_row(&row)
            .map_err(|e| LedgerError::internal(format!("failed to read owner row: {e}")))?;
        Ok(row.into())
    }

    async fn find_owner(&self, full_name: &str) -> LedgerResult<Owner> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, citizenship
            FROM owner
            WHERE full_name = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(full_name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_owner", e))?;

        match row {
            Some(row) => {
                let row = OwnerRow::from_row(&row)
                    .map_err(|e| LedgerError::internal(format!("failed to read owner row: {e}")))?;
                Ok(row.into())
            }
            None => Err(LedgerError::OwnerNotFound(full_name.to_string())),
        }
    }

    #[instrument(skip_all, fields(owner_id = %owner_id, balance = %balance), err)]
    async fn create_account(&self, owner_id: OwnerId, balance: Balance) -> LedgerResult<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO account (owner_id, balance)
            VALUES ($1, $2)
            RETURNING id, owner_id, balance, is_locked
            "#,
        )
        .bind(owner_id.get())
        .bind(balance.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        AccountRow::from_row(&row)
            .map_err(|e| LedgerError::internal(format!("failed to read account row: {e}")))?
            .try_into()
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, balance, is_locked
            FROM account
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;

        match row {
            Some(row) => AccountRow::from_row(&row)
                .map_err(|e| LedgerError::internal(format!("failed to read account row: {e}")))?
                .try_into(),
            None => Err(LedgerError::AccountNotFound(id)),
        }
    }

    #[instrument(skip_all, fields(account_id = %id), err)]
    async fn lock_account(&self, id: AccountId) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE account SET is_locked = TRUE WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("lock_account", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(account_id = %account_id, amount = %amount), err)]
    async fn top_up(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        let mut tx = self.begin("top_up", deadline).await?;

        let outcome = async {
            let balance = credit_unlocked(&mut tx, account_id, amount).await?;
            insert_transaction(&mut tx, NewTransaction::top_up(account_id, amount)).await?;
            Ok::<_, LedgerError>(balance)
        }
        .await;

        finish(tx, "top_up", outcome).await
    }

    #[instrument(skip_all, fields(account_id = %account_id, amount = %amount), err)]
    async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<Balance> {
        let mut tx = self.begin("withdraw", deadline).await?;

        let outcome = async {
            let account = lock_account_row(&mut tx, account_id).await?;
            account.ensure_active()?;
            account.ensure_covers(amount)?;

            let balance = debit_locked(&mut tx, account_id, amount).await?;
            insert_transaction(&mut tx, NewTransaction::withdraw(account_id, amount)).await?;
            Ok::<_, LedgerError>(balance)
        }
        .await;

        finish(tx, "withdraw", outcome).await
    }

    #[instrument(
        skip_all,
        fields(
            debit = %debit,
            credit = %credit,
            amount = %amount,
            locking = ?self.transfer_locking
        ),
        err
    )]
    async fn transfer(
        &self,
        debit: AccountId,
        credit: AccountId,
        amount: Amount,
        deadline: Deadline,
    ) -> LedgerResult<TransferBalances> {
        if debit == credit {
            return Err(LedgerError::validation(
                "debit and credit accounts must differ",
            ));
        }

        let mut tx = self.begin("transfer", deadline).await?;

        let outcome = match self.transfer_locking {
            TransferLocking::DebitOnly => {
                Self::transfer_debit_only(&mut tx, debit, credit, amount).await
            }
            TransferLocking::Ordered => Self::transfer_ordered(&mut tx, debit, credit, amount).await,
        };

        finish(tx, "transfer", outcome).await
    }

    async fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                account_id,
                participating_account_id,
                transaction_type,
                amount,
                occurred_at
            FROM transaction
            WHERE account_id = $1 OR participating_account_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = TransactionRow::from_row(&row)
                .map_err(|e| LedgerError::internal(format!("failed to read transaction row: {e}")))?;
            records.push(record.try_into()?);
        }
        Ok(records)
    }
}

/// Map SQLx errors to LedgerError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // unique / foreign key / check violation
                Some("23505") | Some("23503") | Some("23514") => LedgerError::ConstraintViolation(msg),
                // lock_not_available / query_canceled
                Some("55P03") | Some("57014") => LedgerError::Timeout(msg),
                // numeric_value_out_of_range: the in-memory store reports this
                // as a validation failure too
                Some("22003") => LedgerError::validation("balance overflow"),
                _ => LedgerError::Internal(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            LedgerError::timeout(format!("no connection available in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            LedgerError::internal(format!("connection pool closed in {}", operation))
        }
        _ => LedgerError::internal(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct OwnerRow {
    id: i64,
    full_name: String,
    citizenship: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for OwnerRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(OwnerRow {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            citizenship: row.try_get("citizenship")?,
        })
    }
}

impl From<OwnerRow> for Owner {
    fn from(row: OwnerRow) -> Self {
        Owner {
            id: OwnerId::from_raw(row.id),
            full_name: row.full_name,
            citizenship: row.citizenship,
        }
    }
}

#[derive(Debug)]
struct AccountRow {
    id: i64,
    owner_id: i64,
    balance: i64,
    is_locked: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AccountRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            balance: row.try_get("balance")?,
            is_locked: row.try_get("is_locked")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let balance = Balance::new(row.balance)
            .map_err(|_| LedgerError::internal(format!("account {} has negative balance", row.id)))?;
        Ok(Account {
            id: AccountId::from_raw(row.id),
            owner_id: OwnerId::from_raw(row.owner_id),
            balance,
            is_locked: row.is_locked,
        })
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: i64,
    account_id: i64,
    participating_account_id: Option<i64>,
    transaction_type: i16,
    amount: i64,
    occurred_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TransactionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            participating_account_id: row.try_get("participating_account_id")?,
            transaction_type: row.try_get("transaction_type")?,
            amount: row.try_get("amount")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let amount = Amount::new(row.amount).map_err(|_| {
            LedgerError::internal(format!("transaction {} has non-positive amount", row.id))
        })?;
        Ok(TransactionRecord {
            id: TransactionId::from_raw(row.id),
            account_id: AccountId::from_raw(row.account_id),
            participating_account_id: row.participating_account_id.map(AccountId::from_raw),
            kind: TransactionType::from_code(row.transaction_type)?,
            amount,
            occurred_at: row.occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_locking_parses_config_values() {
        assert_eq!("debit_only".parse(), Ok(TransferLocking::DebitOnly));
        assert_eq!(" Ordered ".parse(), Ok(TransferLocking::Ordered));
        assert!("both".parse::<TransferLocking>().is_err());
    }

    #[test]
    fn ordered_locking_is_the_default() {
        assert_eq!(TransferLocking::default(), TransferLocking::Ordered);
    }

    #[test]
    fn lock_timeout_stays_within_postgres_range() {
        assert_eq!(lock_timeout_setting(Duration::ZERO), "1ms");
        assert_eq!(lock_timeout_setting(Duration::from_millis(250)), "250ms");
        assert_eq!(
            lock_timeout_setting(Duration::from_secs(30 * 24 * 60 * 60)),
            format!("{}ms", i32::MAX)
        );
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        let err = map_sqlx_error("withdraw", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[test]
    fn unexpected_errors_map_to_internal() {
        let err = map_sqlx_error("withdraw", sqlx::Error::RowNotFound);
        assert!(matches!(err, LedgerError::Internal(_)));
        assert!(err.to_string().contains("withdraw"));
    }
}
