//! Token decoding and signature verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and yields its claims.
///
/// Implementations check the signature; the time-window checks are shared
/// via [`validate_claims`] so they stay deterministic and testable.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 (shared-secret) validator.
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Claims use RFC 3339 timestamps, not numeric `exp`/`nbf`; the time
        // window is enforced by `validate_claims` instead.
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        Self {
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use shopforge_core::UserId;

    fn mint(secret: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> String {
        let claims = JwtClaims {
            sub: UserId::new(),
            roles: vec![Role::new("admin")],
            issued_at,
            expires_at,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips_claims() {
        let now = Utc::now();
        let token = mint("secret", now, now + Duration::minutes(10));
        let validator = Hs256JwtValidator::new("secret");
        let claims = validator.validate(&token, now).unwrap();
        assert!(claims.is_admin());
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let token = mint("secret", now, now + Duration::minutes(10));
        let validator = Hs256JwtValidator::new("other-secret");
        assert!(matches!(
            validator.validate(&token, now).unwrap_err(),
            TokenValidationError::Malformed(_)
        ));
    }

    #[test]
    fn expired_token_is_rejected_after_decode() {
        let now = Utc::now();
        let token = mint("secret", now - Duration::hours(2), now - Duration::hours(1));
        let validator = Hs256JwtValidator::new("secret");
        assert_eq!(
            validator.validate(&token, now).unwrap_err(),
            TokenValidationError::Expired
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let validator = Hs256JwtValidator::new("secret");
        assert!(matches!(
            validator.validate("not-a-jwt", Utc::now()).unwrap_err(),
            TokenValidationError::Malformed(_)
        ));
    }
}
