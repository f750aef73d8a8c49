//! Postgres-backed ledger store tests.
//!
//! These run only when `TEST_DATABASE_URL` points at a disposable database;
//! otherwise every test returns early. Each test opens its own owners and
//! accounts, so tests can share one database.

use std::sync::Arc;
use std::time::Duration;

use bank_accounts::{NewOwner, TransactionType};
use bank_core::{AccountId, Amount, Balance, Deadline, LedgerError};
use bank_infra::db;
use bank_infra::ledger_store::schema::apply_schema;
use bank_infra::{
    DatabaseConfig, InMemoryLedgerStore, LedgerEngine, LedgerStore, PostgresLedgerStore,
    TransferLocking,
};
use uuid::Uuid;

async fn default_store() -> Option<Arc<PostgresLedgerStore>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = db::connect(&DatabaseConfig {
        url,
        max_connections: 8,
        acquire_timeout: Duration::from_secs(5),
    })
    .await
    .expect("failed to connect to TEST_DATABASE_URL");
    apply_schema(&pool).await.expect("failed to apply schema");

    Some(Arc::new(PostgresLedgerStore::new(pool)))
}

async fn store(locking: TransferLocking) -> Option<Arc<PostgresLedgerStore>> {
    let store = default_store().await?;
    Some(Arc::new(
        PostgresLedgerStore::new(store.pool().clone()).with_transfer_locking(locking),
    ))
}

async fn open(store: &PostgresLedgerStore, balance: i64) -> AccountId {
    let name = format!("owner-{}", Uuid::now_v7());
    let owner = store
        .create_owner(NewOwner::new(&name, "RU").unwrap())
        .await
        .unwrap();
    store
        .create_account(owner.id, Balance::new(balance).unwrap())
        .await
        .unwrap()
        .id
}

fn amount(v: i64) -> Amount {
    Amount::new(v).unwrap()
}

#[tokio::test]
async fn top_up_and_withdraw_write_audit_records() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let a = open(&store, 500).await;

    assert_eq!(store.top_up(a, amount(50), Deadline::none()).await.unwrap().get(), 550);
    assert_eq!(store.withdraw(a, amount(100), Deadline::none()).await.unwrap().get(), 450);

    let history = store.transactions(a).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionType::TopUp);
    assert_eq!(history[1].kind, TransactionType::Withdraw);
    assert!(history[0].id < history[1].id);
}

#[tokio::test]
async fn overdraft_is_rejected_without_trace() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let a = open(&store, 250).await;

    let err = store
        .withdraw(a, amount(300), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { balance: 250, requested: 300, .. }));
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 250);
    assert!(store.transactions(a).await.unwrap().is_empty());
}

#[tokio::test]
async fn transfer_to_missing_account_rolls_back_debit() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let a = open(&store, 250).await;
    let missing = AccountId::from_raw(i64::MAX);

    let err = store
        .transfer(a, missing, amount(50), Deadline::none())
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound(missing));
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 250);
    assert!(store.transactions(a).await.unwrap().is_empty());
}

#[tokio::test]
async fn locked_flag_is_rechecked_inside_the_transaction() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let a = open(&store, 100).await;
    let b = open(&store, 100).await;
    store.lock_account(b).await.unwrap();

    assert_eq!(
        store.top_up(b, amount(10), Deadline::none()).await,
        Err(LedgerError::AccountLocked(b))
    );
    assert_eq!(
        store.transfer(a, b, amount(10), Deadline::none()).await,
        Err(LedgerError::AccountLocked(b))
    );
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_serialize_on_the_row_lock() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let engine = Arc::new(LedgerEngine::new(store.clone()));
    let a = open(&store, 500).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.withdraw(a, 300, Deadline::after(Duration::from_secs(5))).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(balance) => {
                succeeded += 1;
                assert_eq!(balance.get(), 200);
            }
            Err(err) => assert!(matches!(err, LedgerError::InsufficientFunds { .. })),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 200);
    assert_eq!(store.transactions(a).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ordered_locking_survives_opposite_direction_transfers() {
    let Some(store) = store(TransferLocking::Ordered).await else {
        return;
    };
    let a = open(&store, 1_000).await;
    let b = open(&store, 1_000).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            store
                .transfer(from, to, amount(5), Deadline::after(Duration::from_secs(5)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let total = store.get_account(a).await.unwrap().balance.get()
        + store.get_account(b).await.unwrap().balance.get();
    assert_eq!(total, 2_000);
    assert_eq!(store.transactions(a).await.unwrap().len(), 20);
}

#[tokio::test]
async fn lock_wait_past_deadline_times_out() {
    let Some(store) = store(TransferLocking::DebitOnly).await else {
        return;
    };
    let a = open(&store, 100).await;

    // Hold the row lock from a separate transaction.
    let mut blocker = store.pool().begin().await.unwrap();
    sqlx::query("SELECT id FROM account WHERE id = $1 FOR UPDATE")
        .bind(a.get())
        .execute(&mut *blocker)
        .await
        .unwrap();

    let err = store
        .withdraw(a, amount(10), Deadline::after(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Timeout(_)));

    blocker.rollback().await.unwrap();
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn default_locking_survives_opposite_direction_transfers() {
    let Some(store) = default_store().await else {
        return;
    };
    let a = open(&store, 1_000).await;
    let b = open(&store, 1_000).await;

    let mut handles = Vec::new();
    for i in 0..200 {
        let store = store.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            store
                .transfer(from, to, amount(1), Deadline::after(Duration::from_secs(10)))
                .await
        }));
    }

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            failures.push(err);
        }
    }
    assert!(failures.is_empty(), "failed transfers: {failures:?}");

    assert_eq!(store.get_account(a).await.unwrap().balance.get(), 1_000);
    assert_eq!(store.get_account(b).await.unwrap().balance.get(), 1_000);
    assert_eq!(store.transactions(a).await.unwrap().len(), 200);
}

#[tokio::test]
async fn deadline_beyond_lock_timeout_range_is_accepted() {
    let Some(store) = default_store().await else {
        return;
    };
    let a = open(&store, 100).await;
    let b = open(&store, 100).await;
    let month = Deadline::after(Duration::from_secs(30 * 24 * 60 * 60));

    assert_eq!(store.top_up(a, amount(10), month).await.unwrap().get(), 110);
    assert_eq!(store.withdraw(a, amount(10), month).await.unwrap().get(), 100);
    let balances = store.transfer(a, b, amount(10), month).await.unwrap();
    assert_eq!((balances.debit.get(), balances.credit.get()), (90, 110));
}

#[tokio::test]
async fn balance_overflow_matches_in_memory_store() {
    let Some(store) = default_store().await else {
        return;
    };
    let memory = InMemoryLedgerStore::new();
    let near_max = Balance::new(i64::MAX - 1).unwrap();

    let owner = memory
        .create_owner(NewOwner::new("Overflow Owner", "RU").unwrap())
        .await
        .unwrap();
    let in_memory_account = memory.create_account(owner.id, near_max).await.unwrap().id;
    let expected = memory
        .top_up(in_memory_account, amount(10), Deadline::none())
        .await
        .unwrap_err();

    let a = open(&store, i64::MAX - 1).await;
    let b = open(&store, 100).await;
    let err = store
        .top_up(a, amount(10), Deadline::none())
        .await
        .unwrap_err();
    assert_eq!(err, expected);
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = store
        .transfer(b, a, amount(10), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(store.get_account(a).await.unwrap().balance.get(), i64::MAX - 1);
    assert_eq!(store.get_account(b).await.unwrap().balance.get(), 100);
    assert!(store.transactions(a).await.unwrap().is_empty());
}
