use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{Instrument, field};

use bank_auth::{IdentityError, IdentityVerifier};
use bank_core::{Deadline, MAX_TIMEOUT_MS};

use crate::app::errors::json_error;
use crate::context::{CallerContext, RequestDeadline};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const REQUEST_TIMEOUT_HEADER: HeaderName = HeaderName::from_static("x-request-timeout-ms");

#[derive(Clone)]
pub struct IdentityState {
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Wrap every request in a span carrying a fresh request id, and echo the id
/// back in `x-request-id`.
pub async fn request_span_middleware(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::now_v7();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        subject = field::Empty,
    );

    let mut res = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Reject the request with 401 unless it carries a verifiable bearer token.
/// Runs before the body is read, so a rejected request never reaches the engine.
pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: Request,
    next: Next,
) -> Response {
    let subject = match extract_bearer(req.headers())
        .and_then(|token| state.verifier.verify(token, Utc::now()))
    {
        Ok(subject) => subject,
        Err(e) => {
            tracing::info!(error = %e, "identity check failed");
            return json_error(StatusCode::UNAUTHORIZED, "unauthenticated", e.to_string());
        }
    };

    tracing::Span::current().record("subject", field::display(&subject));
    req.extensions_mut().insert(CallerContext::new(subject));

    next.run(req).await
}

/// Fix the request deadline from `x-request-timeout-ms`, falling back to the
/// configured default.
pub async fn deadline_middleware(
    State(default_timeout): State<Duration>,
    mut req: Request,
    next: Next,
) -> Response {
    let timeout = match request_timeout(req.headers()) {
        Ok(Some(timeout)) => timeout,
        Ok(None) => default_timeout,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    req.extensions_mut()
        .insert(RequestDeadline(Deadline::after(timeout)));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, IdentityError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(IdentityError::MissingToken)?;

    let header = header
        .to_str()
        .map_err(|_| IdentityError::Malformed("authorization header is not ascii".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(IdentityError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(IdentityError::MissingToken);
    }

    Ok(token)
}

fn request_timeout(headers: &HeaderMap) -> Result<Option<Duration>, String> {
    let Some(raw) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return Ok(None);
    };

    let millis = raw
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| (1..=MAX_TIMEOUT_MS).contains(ms))
        .ok_or_else(|| {
            format!("{REQUEST_TIMEOUT_HEADER} must be an integer between 1 and {MAX_TIMEOUT_MS}")
        })?;

    Ok(Some(Duration::from_millis(millis)))
}
