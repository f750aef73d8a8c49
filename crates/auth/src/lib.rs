//! `bank-auth` — identity verification boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API layer
//! hands it a bearer token and gets back a subject or a rejection.

pub mod claims;
pub mod subject;
pub mod verifier;

pub use claims::{IdentityClaims, validate_window};
pub use subject::SubjectId;
pub use verifier::{Hs256IdentityVerifier, IdentityError, IdentityVerifier};
