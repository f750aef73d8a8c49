//! Postgres schema bootstrap.
//!
//! Idempotent DDL for the three ledger tables. The `CHECK` constraints back up
//! the store's own invariants (`balance >= 0`, positive amounts, closed set of
//! transaction types).

use sqlx::PgPool;
use tracing::instrument;

use bank_core::LedgerResult;

use super::postgres::map_sqlx_error;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS owner (
    id          BIGSERIAL PRIMARY KEY,
    full_name   TEXT NOT NULL,
    citizenship TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS owner_full_name_idx ON owner (full_name);

CREATE TABLE IF NOT EXISTS account (
    id        BIGSERIAL PRIMARY KEY,
    owner_id  BIGINT NOT NULL REFERENCES owner (id),
    balance   BIGINT NOT NULL CHECK (balance >= 0),
    is_locked BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS transaction (
    id                      BIGSERIAL PRIMARY KEY,
    account_id              BIGINT NOT NULL REFERENCES account (id),
    participating_account_id BIGINT REFERENCES account (id),
    transaction_type        SMALLINT NOT NULL CHECK (transaction_type IN (1, 2, 3)),
    amount                  BIGINT NOT NULL CHECK (amount > 0),
    occurred_at             TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS transaction_account_id_idx ON transaction (account_id);
CREATE INDEX IF NOT EXISTS transaction_participating_account_id_idx
    ON transaction (participating_account_id);
"#;

/// Create the ledger tables if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn apply_schema(pool: &PgPool) -> LedgerResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("apply_schema", e))?;
    Ok(())
}
