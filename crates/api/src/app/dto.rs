use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bank_accounts::{Account, TransactionRecord, TransactionType};
use bank_core::{AccountId, Amount, Balance, LedgerResult};
use bank_infra::{OpenedAccount, TransferBalances};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub full_name: String,
    pub citizenship: String,
    #[serde(default)]
    pub balance: i64,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        bank_accounts::NewOwner::new(&self.full_name, &self.citizenship)?;
        Balance::new(self.balance)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
}

impl AmountRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        Amount::new(self.amount)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub debit_account_id: i64,
    pub credit_account_id: i64,
    pub amount: i64,
}

impl TransferRequest {
    pub fn validate(&self) -> LedgerResult<(AccountId, AccountId)> {
        let debit = AccountId::parse(self.debit_account_id)?;
        let credit = AccountId::parse(self.credit_account_id)?;
        Amount::new(self.amount)?;
        Ok((debit, credit))
    }
}

/// Unwrap a JSON body, turning axum's rejection into the structured error body.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

// -------------------------
// Response mapping
// -------------------------

pub fn opened_account_to_json(opened: OpenedAccount) -> serde_json::Value {
    serde_json::json!({
        "account_id": opened.account_id.get(),
        "balance": opened.balance.get(),
    })
}

pub fn balance_to_json(balance: Balance) -> serde_json::Value {
    serde_json::json!({ "balance": balance.get() })
}

pub fn transfer_to_json(balances: TransferBalances) -> serde_json::Value {
    serde_json::json!({
        "debit_balance": balances.debit.get(),
        "credit_balance": balances.credit.get(),
    })
}

pub fn account_to_json(account: &Account) -> serde_json::Value {
    serde_json::json!({
        "account_id": account.id.get(),
        "owner_id": account.owner_id.get(),
        "balance": account.balance.get(),
        "locked": account.is_locked,
    })
}

pub fn transaction_type_str(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::TopUp => "top_up",
        TransactionType::Withdraw => "withdraw",
        TransactionType::Transfer => "transfer",
    }
}

pub fn transaction_to_json(record: &TransactionRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id.get(),
        "type": transaction_type_str(record.kind),
        "account_id": record.account_id.get(),
        "participating_account_id": record.participating_account_id.map(|id| id.get()),
        "amount": record.amount.get(),
        "occurred_at": record.occurred_at.to_rfc3339(),
    })
}
