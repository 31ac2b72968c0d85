//! Session tokens: signed blobs carrying the user id and username.

use crate::models::User;
use crate::services::ServiceError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

pub trait SessionGate: Send + Sync {
    fn issue(&self, user: &User) -> Result<String, ServiceError>;
    fn validate(&self, token: &str) -> Result<SessionClaims, ServiceError>;
    fn ttl_days(&self) -> i64;
}

#[derive(Clone)]
pub struct JwtSessionGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_days: i64,
}

impl JwtSessionGate {
    pub fn new(secret: &Secret<String>, ttl_days: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl_days,
        }
    }
}

impl SessionGate for JwtSessionGate {
    fn issue(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.ttl_days)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign session: {}", e)))
    }

    fn validate(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                ServiceError::Authentication("Invalid session".to_string())
            })
    }

    fn ttl_days(&self) -> i64 {
        self.ttl_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(secret: &str) -> JwtSessionGate {
        JwtSessionGate::new(&Secret::new(secret.to_string()), 7)
    }

    fn user() -> User {
        User::new(
            "grace".to_string(),
            "grace@example.com".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn issued_token_validates() {
        let gate = gate("test-secret");
        let user = user();

        let token = gate.issue(&user).unwrap();
        let claims = gate.validate(&token).unwrap();

        assert_eq!(claims.user_id(), user.id);
        assert_eq!(claims.username, "grace");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = gate("one").issue(&user()).unwrap();

        assert!(matches!(
            gate("two").validate(&token),
            Err(ServiceError::Authentication(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(gate("s").validate("not-a-token").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let gate = gate("s");
        let claims = SessionClaims {
            sub: "u".to_string(),
            username: "u".to_string(),
            iat: 0,
            exp: 1,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &gate.encoding_key).unwrap();

        assert!(gate.validate(&token).is_err());
    }
}
