use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use bank_core::{AccountId, ErrorKind, LedgerError};

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AccountLocked | ErrorKind::AccountAlreadyLocked => StatusCode::CONFLICT,
        ErrorKind::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ConstraintViolation | ErrorKind::Internal => {
            // Backend details stay in the logs.
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                kind.as_str(),
                "internal server error",
            );
        }
    };

    json_error(status, kind.as_str(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_account_id(s: &str) -> Result<AccountId, axum::response::Response> {
    s.parse::<AccountId>().map_err(ledger_error_to_response)
}
