use crate::core::errors::LedgerError;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Authenticated principal. `sub` is already the ledger's user id; mapping
/// external identities onto it happens before a token is issued.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub struct JwtService {
    secret: String,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        JwtService { secret }
    }

    /// Issues a token for `user_id`. The identity provider normally does
    /// this; it is exposed for local tooling and tests.
    pub fn generate_token(&self, user_id: &str, ttl: Duration) -> Result<String, LedgerError> {
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| (d + ttl).as_secs() as usize)
            .map_err(|e| LedgerError::InternalServerError(format!("Time error: {}", e)))?;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| LedgerError::InternalServerError(format!("JWT encoding error: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, LedgerError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| LedgerError::Unauthenticated(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let jwt = JwtService::new("test-secret".to_string());
        let token = jwt.generate_token("alice", Duration::from_secs(60)).unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap().sub, "alice");
    }

    #[test]
    fn foreign_tokens_are_rejected() {
        let token = JwtService::new("other".to_string())
            .generate_token("alice", Duration::from_secs(60))
            .unwrap();
        let result = JwtService::new("test-secret".to_string()).validate_token(&token);
        assert!(matches!(result, Err(LedgerError::Unauthenticated(_))));
    }
}
