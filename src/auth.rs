use crate::config::JwtConfig;
use crate::models::Claims;
use anyhow::{anyhow, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_hours: i64,
    revoked: RwLock<HashSet<Uuid>>,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let validation = Validation::default();

        Self {
            encoding_key,
            decoding_key,
            validation,
            expiration_hours: config.expiration_hours,
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Generate a new JWT token for a user
    pub fn generate_token(&self, user_id: Uuid, email: &str, role: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.expiration_hours * 3600);

        let claims = Claims {
            sub: email.to_string(),
            user_id,
            role: role.to_string(),
            exp,
            iat: now,
            jti: Uuid::new_v4(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Token generation failed: {}", e))
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {}", e))
    }

    /// Revoke a token (for logout)
    pub fn revoke_token(&self, claims: &Claims) {
        self.revoked
            .write()
            .expect("revocation set poisoned")
            .insert(claims.jti);
    }

    /// Check if a token has been revoked
    pub fn is_token_revoked(&self, jti: Uuid) -> bool {
        self.revoked
            .read()
            .expect("revocation set poisoned")
            .contains(&jti)
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<String> {
    match auth_header {
        Some(header) if header.starts_with("Bearer ") => {
            Ok(header.trim_start_matches("Bearer ").to_string())
        }
        _ => Err(anyhow!("Missing or invalid Authorization header")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test_secret_key_minimum_32_chars_long_for_security".to_string(),
            expiration_hours: 24,
        }
    }

    #[test]
    fn test_token_generation_and_validation() {
        let auth = JwtAuth::new(&test_config());
        let user_id = Uuid::new_v4();
        let email = "test@example.com";
        let role = "clerk";

        let token = auth
            .generate_token(user_id, email, role)
            .expect("Token generation failed");
        let claims = auth.validate_token(&token).expect("Token validation failed");

        assert_eq!(claims.sub, email);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, role);
    }

    #[test]
    fn test_invalid_token() {
        let auth = JwtAuth::new(&test_config());
        let result = auth.validate_token("invalid.token.here");

        assert!(result.is_err());
    }

    #[test]
    fn test_revocation() {
        let auth = JwtAuth::new(&test_config());
        let token = auth
            .generate_token(Uuid::new_v4(), "test@example.com", "clerk")
            .unwrap();
        let claims = auth.validate_token(&token).unwrap();

        assert!(!auth.is_token_revoked(claims.jti));
        auth.revoke_token(&claims);
        assert!(auth.is_token_revoked(claims.jti));
    }
}
