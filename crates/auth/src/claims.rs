use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdentityError, SubjectId};

/// JWT claims accepted by the ledger service.
///
/// Tokens minted by the account service carry `email` and `exp`; tokens from
/// other issuers may carry a standard `sub` instead. Timestamps are seconds
/// since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration timestamp.
    pub exp: i64,
}

impl IdentityClaims {
    /// Subject asserted by the token: `sub`, falling back to `email`.
    pub fn subject(&self) -> Result<SubjectId, IdentityError> {
        [self.sub.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(SubjectId::new)
            .ok_or(IdentityError::MissingSubject)
    }
}

/// Deterministically validate the claims' time window against `now`.
pub fn validate_window(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), IdentityError> {
    let now = now.timestamp();

    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(IdentityError::Malformed(
                "invalid token time window (exp <= iat)".to_string(),
            ));
        }
        if now < iat {
            return Err(IdentityError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(IdentityError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn claims(iat: Option<i64>, exp: i64) -> IdentityClaims {
        IdentityClaims {
            sub: None,
            email: Some("ivan@example.com".to_string()),
            iat,
            exp,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn window_boundaries() {
        let c = claims(Some(100), 200);
        assert_eq!(validate_window(&c, at(99)), Err(IdentityError::NotYetValid));
        assert_eq!(validate_window(&c, at(100)), Ok(()));
        assert_eq!(validate_window(&c, at(199)), Ok(()));
        assert_eq!(validate_window(&c, at(200)), Err(IdentityError::Expired));
    }

    #[test]
    fn inverted_window_is_malformed() {
        let c = claims(Some(200), 200);
        assert!(matches!(validate_window(&c, at(150)), Err(IdentityError::Malformed(_))));
    }

    #[test]
    fn subject_prefers_sub_over_email() {
        let mut c = claims(None, 10);
        assert_eq!(c.subject().unwrap().as_str(), "ivan@example.com");

        c.sub = Some("user-42".to_string());
        assert_eq!(c.subject().unwrap().as_str(), "user-42");

        c.sub = Some("  ".to_string());
        c.email = None;
        assert_eq!(c.subject(), Err(IdentityError::MissingSubject));
    }

    proptest! {
        #[test]
        fn tokens_without_iat_are_valid_exactly_before_exp(exp in 0i64..1_000_000, now in 0i64..1_000_000) {
            let outcome = validate_window(&claims(None, exp), at(now));
            prop_assert_eq!(outcome.is_ok(), now < exp);
        }
    }
}
