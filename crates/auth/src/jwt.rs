//! Bearer token decoding.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};

/// Turns a raw bearer token into validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 signed tokens sharing one secret with the issuer.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window lives in `issued_at`/`expires_at`, checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenValidationError::InvalidSignature,
            _ => TokenValidationError::Malformed(e.to_string()),
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use propledger_core::{TenantId, UserId};

    fn mint(secret: &str, ttl: Duration) -> (String, JwtClaims) {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("accountant")],
            issued_at: now - Duration::seconds(1),
            expires_at: now + ttl,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (token, claims)
    }

    #[test]
    fn accepts_tokens_signed_with_the_shared_secret() {
        let (token, claims) = mint("s3cret", Duration::minutes(10));
        let v = Hs256JwtValidator::new("s3cret");
        assert_eq!(v.validate(&token, Utc::now()).unwrap(), claims);
    }

    #[test]
    fn rejects_foreign_signatures() {
        let (token, _) = mint("other", Duration::minutes(10));
        let v = Hs256JwtValidator::new("s3cret");
        assert_eq!(v.validate(&token, Utc::now()), Err(TokenValidationError::InvalidSignature));
    }

    #[test]
    fn rejects_expired_and_garbage_tokens() {
        let (token, _) = mint("s3cret", Duration::minutes(10));
        let v = Hs256JwtValidator::new("s3cret");
        assert_eq!(
            v.validate(&token, Utc::now() + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
        assert!(matches!(
            v.validate("not-a-jwt", Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
