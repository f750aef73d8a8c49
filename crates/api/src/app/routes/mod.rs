use axum::{routing::post, Router};

pub mod accounts;
pub mod system;
pub mod transfers;

/// Router for all authenticated ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .route("/transfers", post(transfers::transfer))
}
