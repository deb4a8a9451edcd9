//! # Session Tokens
//!
//! JWT issuing and verification (HS256).
//!
//! ## What A Token Carries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Token Claims                                      │
//! │                                                                         │
//! │  sub        user id                                                    │
//! │  role       role AT ISSUE TIME (informational; re-derived on verify)   │
//! │  tenant_id  shop binding, None for system-scope super-admins           │
//! │  iat / exp  issue time / expiry                                        │
//! │  jti        unique token id                                            │
//! │                                                                         │
//! │  NOT carried: permissions. The authenticator re-derives them from      │
//! │  the live user record on every request, so revocations and override    │
//! │  changes take effect without waiting for token expiry.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plaza_core::Role;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// JWT claims for a Plaza session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Role at issue time. Authorization decisions use the live record.
    pub role: Role,
    /// Tenant binding; `None` for system-scope (super-admin) sessions.
    pub tenant_id: Option<String>,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        TokenService {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            lifetime_secs: config.token_lifetime_secs,
        }
    }

    /// Issues a token for a user.
    pub fn issue(&self, user_id: &str, role: Role, tenant_id: Option<String>) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            tenant_id,
            iat: now,
            exp: now + self.lifetime_secs,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token encoding failed: {e}")))
    }

    /// Verifies signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;
        Ok(data.claims)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let service = TokenService::new(&AuthConfig::for_tests(3600));
        let token = service
            .issue("user-1", Role::Staff, Some("shop-1".to_string()))
            .unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.tenant_id.as_deref(), Some("shop-1"));
    }

    #[test]
    fn test_system_scope_token_has_no_tenant() {
        let service = TokenService::new(&AuthConfig::for_tests(3600));
        let token = service.issue("admin-1", Role::SuperAdmin, None).unwrap();
        let claims = service.verify(&token).unwrap();
        assert!(claims.tenant_id.is_none());
    }

    #[test]
    fn test_expired_token_is_distinct_error() {
        // Lifetime far enough in the past to clear the default 60s leeway
        let service = TokenService::new(&AuthConfig::for_tests(-300));
        let token = service.issue("user-1", Role::Staff, None).unwrap();

        assert!(matches!(
            service.verify(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let service = TokenService::new(&AuthConfig::for_tests(3600));
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            token_lifetime_secs: 3600,
        });

        let token = other.issue("user-1", Role::Staff, None).unwrap();
        assert!(matches!(
            service.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            service.verify("not-a-token"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
