//! # Auth Error Types
//!
//! Every rejection path in authentication and authorization has its own
//! variant, so callers (and HTTP mappers) can tell a bad token from a
//! revoked account from a suspended shop.

use plaza_core::{Permission, Role};
use plaza_db::DbError;
use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token failed signature or structural validation.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token signature is valid but the token has expired.
    ///
    /// Distinct from `InvalidToken` so clients know to re-authenticate
    /// rather than treat it as a bug.
    #[error("Token expired")]
    TokenExpired,

    /// Token references a user that no longer exists.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The user record exists but has been deactivated.
    ///
    /// ## When This Occurs
    /// - Account revoked between token issue and this request
    ///
    /// Revocation wins over any outstanding token.
    #[error("User account is deactivated: {0}")]
    InactiveUser(String),

    /// A tenant-scoped operation was attempted without a tenant binding
    /// (a system-scope token on a shop endpoint).
    #[error("Request requires a tenant context")]
    MissingTenantContext,

    /// The shop is not in active status.
    #[error("Shop is {status}")]
    TenantSuspended { status: String },

    /// The shop's subscription has lapsed.
    #[error("Shop subscription has expired")]
    SubscriptionExpired,

    /// Identity lacks the required permission.
    #[error("Permission denied: {role:?} lacks {permission:?}")]
    Forbidden {
        permission: Permission,
        role: Role,
    },

    /// Login credentials did not match.
    ///
    /// Deliberately does not say whether the email or the password was
    /// wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Storage layer failure during an auth check.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Internal error (hashing failure, misconfiguration).
    #[error("Internal auth error: {0}")]
    Internal(String),
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
