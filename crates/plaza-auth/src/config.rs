//! # Auth Configuration
//!
//! Loaded from environment variables with development defaults.
//!
//! ## Environment Variables
//! | Variable              | Default          | Description              |
//! |-----------------------|------------------|--------------------------|
//! | `JWT_SECRET`          | dev placeholder  | HMAC signing secret      |
//! | `TOKEN_LIFETIME_SECS` | 3600             | Token validity window    |

use tracing::warn;

const DEV_SECRET: &str = "dev-secret-change-in-production";

/// Auth layer configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for token signing.
    pub jwt_secret: String,
    /// How long issued tokens stay valid, in seconds.
    pub token_lifetime_secs: i64,
}

impl AuthConfig {
    /// Loads configuration from the environment.
    ///
    /// Falls back to a development secret (with a warning) when
    /// `JWT_SECRET` is unset; production deployments must set it.
    pub fn from_env() -> Self {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_SECRET.to_string()
            }
        };

        let token_lifetime_secs = std::env::var("TOKEN_LIFETIME_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        AuthConfig {
            jwt_secret,
            token_lifetime_secs,
        }
    }

    /// Fixed configuration for tests.
    pub fn for_tests(lifetime_secs: i64) -> Self {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_lifetime_secs: lifetime_secs,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_SECRET.to_string(),
            token_lifetime_secs: 3600,
        }
    }
}
