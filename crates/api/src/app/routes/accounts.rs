use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestDeadline;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account))
        .route("/:id", get(get_account))
        .route("/:id/top-up", post(top_up))
        .route("/:id/withdraw", post(withdraw))
        .route("/:id/lock", post(lock_account))
        .route("/:id/transactions", get(list_transactions))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    payload: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = body.validate() {
        return errors::ledger_error_to_response(e);
    }

    match services
        .engine()
        .create_account(&body.full_name, &body.citizenship, body.balance, deadline.get())
        .await
    {
        Ok(opened) => {
            (StatusCode::CREATED, Json(dto::opened_account_to_json(opened))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match errors::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().account(account_id, deadline.get()).await {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn top_up(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<String>,
    payload: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account_id, body) = match amount_request(&id, payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .engine()
        .top_up(account_id, body.amount, deadline.get())
        .await
    {
        Ok(balance) => (StatusCode::OK, Json(dto::balance_to_json(balance))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<String>,
    payload: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account_id, body) = match amount_request(&id, payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .engine()
        .withdraw(account_id, body.amount, deadline.get())
        .await
    {
        Ok(balance) => (StatusCode::OK, Json(dto::balance_to_json(balance))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn lock_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match errors::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().lock(account_id, deadline.get()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "account_id": account_id.get(), "locked": true })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match errors::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().history(account_id, deadline.get()).await {
        Ok(records) => {
            let items = records.iter().map(dto::transaction_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

fn amount_request(
    id: &str,
    payload: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> Result<(bank_core::AccountId, dto::AmountRequest), axum::response::Response> {
    let account_id = errors::parse_account_id(id)?;
    let body = dto::body(payload)?;
    body.validate().map_err(errors::ledger_error_to_response)?;
    Ok((account_id, body))
}
