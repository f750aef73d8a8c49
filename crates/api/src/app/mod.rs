//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backend selection and engine construction
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use bank_auth::{Hs256IdentityVerifier, IdentityVerifier};
use bank_core::LedgerResult;
use bank_infra::LedgerConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (public entrypoint used by
/// `main.rs`). Returns the services too so the caller can shut them down.
pub async fn build_app(config: &LedgerConfig) -> LedgerResult<(Router, Arc<services::AppServices>)> {
    let services = Arc::new(services::build_services(config).await?);
    let verifier = Arc::new(Hs256IdentityVerifier::new(config.jwt_secret.as_bytes()));
    Ok((build_router(services.clone(), verifier), services))
}

/// Assemble the router over already-built services.
pub fn build_router(
    services: Arc<services::AppServices>,
    verifier: Arc<dyn IdentityVerifier>,
) -> Router {
    let identity_state = middleware::IdentityState { verifier };
    let default_deadline = services.default_deadline();

    // Protected routes: identity check first, then the request deadline.
    let protected = routes::router()
        .route("/whoami", get(routes::system::whoami))
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            default_deadline,
            middleware::deadline_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            identity_state,
            middleware::identity_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(
            middleware::request_span_middleware,
        )))
}
