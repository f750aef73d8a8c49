use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::debug;

use crate::claims::{IdentityClaims, validate_window};
use crate::SubjectId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("token carries no subject")]
    MissingSubject,
}

/// Capability the boundary consults before any ledger operation: verify a
/// bearer token and return the caller's subject, or reject it.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SubjectId, IdentityError>;
}

/// HS256 JWT verifier with a shared secret.
///
/// Signature and structure are checked by `jsonwebtoken`; the time window is
/// checked against the caller-supplied `now` so verification is deterministic.
pub struct Hs256IdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256IdentityVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256IdentityVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256IdentityVerifier").finish_non_exhaustive()
    }
}

impl IdentityVerifier for Hs256IdentityVerifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SubjectId, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }

        let data = jsonwebtoken::decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                match e.kind() {
                    JwtErrorKind::InvalidSignature => IdentityError::BadSignature,
                    JwtErrorKind::ExpiredSignature => IdentityError::Expired,
                    JwtErrorKind::ImmatureSignature => IdentityError::NotYetValid,
                    _ => IdentityError::Malformed(e.to_string()),
                }
            })?;

        validate_window(&data.claims, now)?;
        data.claims.subject()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn mint(secret: &str, claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_account_service_tokens() {
        let now = Utc::now();
        let token = mint(
            SECRET,
            json!({ "email": "ivan@example.com", "exp": (now + Duration::minutes(10)).timestamp() }),
        );

        let subject = Hs256IdentityVerifier::new(SECRET).verify(&token, now).unwrap();
        assert_eq!(subject.as_str(), "ivan@example.com");
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint(
            "other-secret",
            json!({ "sub": "u1", "exp": (now + Duration::minutes(10)).timestamp() }),
        );

        assert_eq!(
            Hs256IdentityVerifier::new(SECRET).verify(&token, now),
            Err(IdentityError::BadSignature)
        );
    }

    #[test]
    fn rejects_expired_tokens_relative_to_now() {
        let now = Utc::now();
        let token = mint(SECRET, json!({ "sub": "u1", "exp": now.timestamp() }));

        let verifier = Hs256IdentityVerifier::new(SECRET);
        assert_eq!(verifier.verify(&token, now), Err(IdentityError::Expired));
        assert!(verifier.verify(&token, now - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn rejects_garbage_and_empty_tokens() {
        let verifier = Hs256IdentityVerifier::new(SECRET);
        assert_eq!(verifier.verify("  ", Utc::now()), Err(IdentityError::MissingToken));
        assert!(matches!(
            verifier.verify("not.a.jwt", Utc::now()),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_tokens_without_exp_or_subject() {
        let now = Utc::now();
        let verifier = Hs256IdentityVerifier::new(SECRET);

        let no_exp = mint(SECRET, json!({ "sub": "u1" }));
        assert!(matches!(verifier.verify(&no_exp, now), Err(IdentityError::Malformed(_))));

        let no_subject = mint(SECRET, json!({ "exp": (now + Duration::minutes(1)).timestamp() }));
        assert_eq!(verifier.verify(&no_subject, now), Err(IdentityError::MissingSubject));
    }
}
