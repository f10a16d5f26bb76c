//! Bearer-token verification (HS256).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("malformed or badly signed token: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a raw bearer token and returns its validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HMAC-SHA256 validator with a shared secret.
///
/// Time-window checks use the RFC 3339 `issued_at`/`expires_at` claims through
/// [`validate_claims`], not the numeric `exp` claim.
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            decoding: DecodingKey::from_secret(&secret),
            encoding: EncodingKey::from_secret(&secret),
            validation,
        }
    }

    /// Sign claims with the same secret (dev tooling and tests).
    pub fn issue(&self, claims: &JwtClaims) -> Result<String, JwtError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockline_core::UserId;

    use crate::Role;

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            roles: vec![Role::WAREHOUSE],
            issued_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let v = Hs256JwtValidator::new(b"secret".to_vec());
        let now = Utc::now();
        let c = claims(now);
        let token = v.issue(&c).unwrap();
        assert_eq!(v.validate(&token, now).unwrap(), c);
    }

    #[test]
    fn other_secret_is_rejected() {
        let a = Hs256JwtValidator::new(b"secret-a".to_vec());
        let b = Hs256JwtValidator::new(b"secret-b".to_vec());
        let now = Utc::now();
        let token = a.issue(&claims(now)).unwrap();
        assert!(matches!(b.validate(&token, now), Err(JwtError::Decode(_))));
    }

    #[test]
    fn expired_claims_are_rejected_after_signature_check() {
        let v = Hs256JwtValidator::new(b"secret".to_vec());
        let now = Utc::now();
        let token = v.issue(&claims(now)).unwrap();
        assert!(matches!(
            v.validate(&token, now + Duration::hours(1)),
            Err(JwtError::Claims(TokenValidationError::Expired))
        ));
    }
}
