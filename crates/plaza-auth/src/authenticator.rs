//! # Session Authenticator
//!
//! Turns a bearer token into a verified [`Identity`], re-deriving
//! everything revocable from live records.
//!
//! ## Verification Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     verify(token)                                       │
//! │                                                                         │
//! │  1. Decode + check signature/expiry      → InvalidToken / TokenExpired │
//! │  2. Resolve the token's namespace        → InvalidTenant               │
//! │     (tenant store, or system store for super-admin sessions)           │
//! │  3. Load the LIVE user record            → UserNotFound                │
//! │  4. Check is_active                      → InactiveUser                │
//! │  5. Derive permissions from role + overrides (never from the token)    │
//! │                                                                         │
//! │  Tenant lifecycle (status, subscription) is a SEPARATE gate:           │
//! │  authorize_shop() runs per request on tenant-scoped operations, so     │
//! │  identity errors and tenant-state errors stay distinguishable.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use tracing::{info, warn};

use plaza_core::{effective_permissions, Permission, Role, Shop, ShopStatus, User};
use plaza_db::{ConnectionRouter, DbError, StoreHandle};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::TokenService;

// =============================================================================
// Identity
// =============================================================================

/// A verified caller identity for one request.
///
/// Permissions here were derived from the live user record at verification
/// time; they are request-scoped and never persisted or re-used.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    /// Tenant binding; `None` for system-scope sessions.
    pub tenant_id: Option<String>,
    pub permissions: HashSet<Permission>,
}

impl Identity {
    /// Whether this identity holds a permission.
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// The tenant this identity is bound to, for tenant-scoped operations.
    ///
    /// ## Errors
    /// `MissingTenantContext` for system-scope sessions: a super-admin
    /// token does not implicitly act inside any shop.
    pub fn require_tenant(&self) -> AuthResult<&str> {
        self.tenant_id
            .as_deref()
            .ok_or(AuthError::MissingTenantContext)
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("stored hash unparseable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// =============================================================================
// Session Authenticator
// =============================================================================

/// Authenticates sessions and gates tenant access.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    router: Arc<ConnectionRouter>,
    tokens: TokenService,
}

impl SessionAuthenticator {
    pub fn new(router: Arc<ConnectionRouter>, config: &AuthConfig) -> Self {
        SessionAuthenticator {
            router,
            tokens: TokenService::new(config),
        }
    }

    /// Issues a session token for a user.
    pub fn issue(&self, user: &User) -> AuthResult<String> {
        self.tokens.issue(
            &user.id,
            user.role,
            user.tenant_context().map(str::to_string),
        )
    }

    /// Verifies a token and builds the request identity.
    ///
    /// Permissions and active status come from the live user record, so a
    /// deactivation or override change takes effect on the very next
    /// request, not at token expiry.
    pub async fn verify(&self, token: &str) -> AuthResult<Identity> {
        let claims = self.tokens.verify(token)?;

        // Only super-admin sessions may float free of a tenant
        if claims.role != Role::SuperAdmin && claims.tenant_id.is_none() {
            return Err(AuthError::MissingTenantContext);
        }

        let store = self.store_for(claims.tenant_id.as_deref())?;

        let user = match store.users().get_by_id(&claims.sub).await {
            Ok(user) => user,
            Err(DbError::NotFound { .. }) => {
                warn!(user_id = %claims.sub, "Token references missing user");
                return Err(AuthError::UserNotFound(claims.sub));
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Rejected token for deactivated user");
            return Err(AuthError::InactiveUser(user.id));
        }

        Ok(Identity {
            permissions: effective_permissions(user.role, &user.permission_overrides),
            user_id: user.id,
            name: user.name,
            role: user.role,
            tenant_id: claims.tenant_id,
        })
    }

    /// Gates a tenant-scoped request on the shop's live lifecycle state.
    ///
    /// Re-checked on every request; never cached in tokens. Returns the
    /// shop so callers can reuse the loaded record.
    ///
    /// ## Errors
    /// - `TenantSuspended` - shop is suspended or inactive
    /// - `SubscriptionExpired` - subscription lapsed (active shops too)
    pub async fn authorize_shop(&self, tenant_id: &str) -> AuthResult<Shop> {
        let system = self.router.resolve_system()?;
        let shop = match system.shops().get(tenant_id).await {
            Ok(shop) => shop,
            Err(DbError::NotFound { .. }) => {
                return Err(AuthError::Db(DbError::InvalidTenant(tenant_id.to_string())))
            }
            Err(e) => return Err(e.into()),
        };

        if shop.status != ShopStatus::Active {
            return Err(AuthError::TenantSuspended {
                status: shop.status.as_str().to_string(),
            });
        }
        if shop.subscription_expired(Utc::now()) {
            return Err(AuthError::SubscriptionExpired);
        }

        Ok(shop)
    }

    /// Authenticates credentials and issues a session.
    ///
    /// For shop users the shop gate runs first, so a suspended shop's
    /// staff cannot even log in. Lookup misses and password mismatches
    /// both surface as `InvalidCredentials`.
    pub async fn login(
        &self,
        tenant_id: Option<&str>,
        email: &str,
        password: &str,
    ) -> AuthResult<(String, Identity)> {
        if let Some(tenant) = tenant_id {
            self.authorize_shop(tenant).await?;
        }

        let store = self.store_for(tenant_id)?;
        let user = match store.users().get_by_email(email).await {
            Ok(user) => user,
            Err(DbError::NotFound { .. }) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            return Err(AuthError::InactiveUser(user.id));
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue(&user)?;
        info!(user_id = %user.id, tenant_id = ?tenant_id, "Login succeeded");

        Ok((
            token,
            Identity {
                permissions: effective_permissions(user.role, &user.permission_overrides),
                user_id: user.id,
                name: user.name,
                role: user.role,
                tenant_id: tenant_id.map(str::to_string),
            },
        ))
    }

    fn store_for(&self, tenant_id: Option<&str>) -> AuthResult<StoreHandle> {
        match tenant_id {
            Some(tenant) => Ok(self.router.resolve(tenant)?),
            None => Ok(self.router.resolve_system()?),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use plaza_db::RouterConfig;
    use uuid::Uuid;

    async fn test_router() -> Arc<ConnectionRouter> {
        Arc::new(
            ConnectionRouter::connect(RouterConfig::in_memory())
                .await
                .unwrap(),
        )
    }

    async fn insert_shop(router: &ConnectionRouter, id: &str, status: ShopStatus) {
        let now = Utc::now();
        router
            .resolve_system()
            .unwrap()
            .shops()
            .insert(&Shop {
                id: id.to_string(),
                name: "Test Shop".to_string(),
                status,
                subscription_expires_at: now + Duration::days(30),
                owner_email: "owner@test.example".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    async fn insert_user(
        router: &ConnectionRouter,
        tenant_id: &str,
        role: Role,
        password: &str,
    ) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: "Test User".to_string(),
            email: "user@test.example".to_string(),
            role,
            permission_overrides: vec![],
            is_active: true,
            password_hash: hash_password(password).unwrap(),
            created_at: now,
            updated_at: now,
        };
        router
            .resolve(tenant_id)
            .unwrap()
            .users()
            .insert(&user)
            .await
            .unwrap();
        user
    }

    #[tokio::test]
    async fn test_verify_derives_permissions_from_live_record() {
        let router = test_router().await;
        insert_shop(&router, "shop-1", ShopStatus::Active).await;
        let user = insert_user(&router, "shop-1", Role::Staff, "pw").await;

        let auth = SessionAuthenticator::new(Arc::clone(&router), &AuthConfig::for_tests(3600));
        let token = auth.issue(&user).unwrap();

        let identity = auth.verify(&token).await.unwrap();
        assert!(identity.can(Permission::CreateSale));
        assert!(!identity.can(Permission::DeleteProduct));
        assert_eq!(identity.require_tenant().unwrap(), "shop-1");

        // Grant an override; the SAME token now carries the new permission
        router
            .resolve("shop-1")
            .unwrap()
            .users()
            .set_permission_overrides(&user.id, &[Permission::DeleteProduct])
            .await
            .unwrap();
        let identity = auth.verify(&token).await.unwrap();
        assert!(identity.can(Permission::DeleteProduct));
    }

    #[tokio::test]
    async fn test_deactivation_wins_over_outstanding_token() {
        let router = test_router().await;
        insert_shop(&router, "shop-1", ShopStatus::Active).await;
        let user = insert_user(&router, "shop-1", Role::Staff, "pw").await;

        let auth = SessionAuthenticator::new(Arc::clone(&router), &AuthConfig::for_tests(3600));
        let token = auth.issue(&user).unwrap();
        assert!(auth.verify(&token).await.is_ok());

        router
            .resolve("shop-1")
            .unwrap()
            .users()
            .deactivate(&user.id)
            .await
            .unwrap();
        assert!(matches!(
            auth.verify(&token).await,
            Err(AuthError::InactiveUser(_))
        ));
    }

    #[tokio::test]
    async fn test_shop_gate_blocks_suspended_and_expired() {
        let router = test_router().await;
        insert_shop(&router, "shop-ok", ShopStatus::Active).await;
        insert_shop(&router, "shop-sus", ShopStatus::Suspended).await;

        let auth = SessionAuthenticator::new(Arc::clone(&router), &AuthConfig::for_tests(3600));
        assert!(auth.authorize_shop("shop-ok").await.is_ok());
        assert!(matches!(
            auth.authorize_shop("shop-sus").await,
            Err(AuthError::TenantSuspended { status }) if status == "suspended"
        ));

        // Active status but lapsed subscription still fails
        router
            .resolve_system()
            .unwrap()
            .shops()
            .set_subscription_expiry("shop-ok", Utc::now() - Duration::days(1))
            .await
            .unwrap();
        assert!(matches!(
            auth.authorize_shop("shop-ok").await,
            Err(AuthError::SubscriptionExpired)
        ));
    }

    #[tokio::test]
    async fn test_login_flow() {
        let router = test_router().await;
        insert_shop(&router, "shop-1", ShopStatus::Active).await;
        insert_user(&router, "shop-1", Role::ShopAdmin, "correct-horse").await;

        let auth = SessionAuthenticator::new(Arc::clone(&router), &AuthConfig::for_tests(3600));

        let (token, identity) = auth
            .login(Some("shop-1"), "user@test.example", "correct-horse")
            .await
            .unwrap();
        assert_eq!(identity.role, Role::ShopAdmin);
        assert!(auth.verify(&token).await.is_ok());

        assert!(matches!(
            auth.login(Some("shop-1"), "user@test.example", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login(Some("shop-1"), "nobody@test.example", "x").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_system_scope_has_no_tenant_context() {
        let router = test_router().await;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            tenant_id: plaza_core::SYSTEM_TENANT_ID.to_string(),
            name: "Root".to_string(),
            email: "root@plaza.example".to_string(),
            role: Role::SuperAdmin,
            permission_overrides: vec![],
            is_active: true,
            password_hash: hash_password("pw").unwrap(),
            created_at: now,
            updated_at: now,
        };
        router
            .resolve_system()
            .unwrap()
            .users()
            .insert(&user)
            .await
            .unwrap();

        let auth = SessionAuthenticator::new(Arc::clone(&router), &AuthConfig::for_tests(3600));
        let token = auth.issue(&user).unwrap();
        let identity = auth.verify(&token).await.unwrap();

        assert!(identity.can(Permission::ManageShops));
        assert!(matches!(
            identity.require_tenant(),
            Err(AuthError::MissingTenantContext)
        ));
    }
}
