use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestDeadline;

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(deadline): Extension<RequestDeadline>,
    payload: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (debit, credit) = match body.validate() {
        Ok(ids) => ids,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services
        .engine()
        .transfer(debit, credit, body.amount, deadline.get())
        .await
    {
        Ok(balances) => (StatusCode::OK, Json(dto::transfer_to_json(balances))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
