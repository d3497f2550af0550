use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use commerce_core::UserId;

use crate::Role;

/// JWT claims model.
///
/// Timestamps travel as the registered `iat`/`exp` claims (seconds since the
/// epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::ADMIN)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Validate the claims' time window. Signature checks live in [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims(iat: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            roles: vec![Role::CUSTOMER],
            issued_at: iat,
            expires_at: iat + ttl,
        }
    }

    #[test]
    fn time_window_is_enforced() {
        let iat = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let c = claims(iat, Duration::minutes(10));

        assert_eq!(validate_claims(&c, iat + Duration::minutes(1)), Ok(()));
        assert_eq!(
            validate_claims(&c, iat - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&c, iat + Duration::minutes(10)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(iat, Duration::zero()), iat),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn serialises_registered_claim_names() {
        let iat = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let c = claims(iat, Duration::minutes(10));
        let json = serde_json::to_value(&c).unwrap();

        assert_eq!(json["iat"], iat.timestamp());
        assert_eq!(json["exp"], (iat + Duration::minutes(10)).timestamp());
        assert_eq!(json["roles"][0], "customer");
        assert!(!c.is_admin());
    }
}
