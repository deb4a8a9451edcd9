//! # Connection Router
//!
//! Tenant resolution and connection lifecycle management.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ConnectionRouter                                  │
//! │                                                                         │
//! │  Startup                                                               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  RouterConfig::new(path) ← bounded pool, timeouts, WAL                 │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ConnectionRouter::connect(config)                                     │
//! │     │                                                                   │
//! │     ├── Primary reachable ──► SqlitePool (file, WAL)   [Primary]       │
//! │     └── Primary FAILED    ──► SqlitePool (:memory:)    [FallbackMemory]│
//! │                               seeded demo data, flagged in health()    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  resolve("shop-42") ──► StoreHandle { pool, tenant_id: "shop-42" }     │
//! │  resolve_system()   ──► StoreHandle { pool, tenant_id: "system" }      │
//! │     │                                                                   │
//! │     │  Handles are cached process-wide; initialize-once-per-key.       │
//! │     ▼                                                                   │
//! │  handle.products() / handle.inventory() / handle.sales() / ...         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Namespace Model
//! `resolve` is a pure mapping from tenant identifier to a logical
//! namespace within the ONE underlying connection pool: no per-tenant
//! physical connection is ever opened. Every repository query produced
//! from a [`StoreHandle`] is scoped by its `tenant_id`, so rows from
//! different shops never mix.
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block writers
//! - Better crash recovery

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use plaza_core::validation::validate_tenant_id;
use plaza_core::SYSTEM_TENANT_ID;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::inventory::InventoryRepository;
use crate::repository::product::ProductRepository;
use crate::repository::returns::ReturnRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::shop::ShopRepository;
use crate::repository::user::UserRepository;

/// Resolve-path log sampling: after the first resolve of a tenant, only
/// every Nth cache hit is logged, to avoid flooding under churn.
const RESOLVE_LOG_SAMPLE: u64 = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Router configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = RouterConfig::new("/var/lib/plaza/plaza.db")
///     .max_connections(5)
///     .fallback_to_memory(true);
/// ```
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection/acquire timeout. Storage calls that exceed this surface
    /// `StorageUnavailable` instead of hanging the caller.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Degrade to an in-memory store when the primary is unreachable at
    /// startup, instead of failing. The fallback is seeded with demo data
    /// and clearly flagged in `health()`.
    /// Default: false (opt in; tests and degraded-mode deployments)
    pub fallback_to_memory: bool,
}

impl RouterConfig {
    /// Creates a new router configuration with the given database path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RouterConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            fallback_to_memory: false,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables the in-memory fallback.
    pub fn fallback_to_memory(mut self, enabled: bool) -> Self {
        self.fallback_to_memory = enabled;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Note
    /// In-memory SQLite requires a single connection: each pooled
    /// connection would otherwise see its own private database.
    pub fn in_memory() -> Self {
        RouterConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            fallback_to_memory: false,
        }
    }
}

// =============================================================================
// Store Backend
// =============================================================================

/// Which concrete store the router is serving from.
///
/// Exposed through `health()` so degraded mode is visible to readiness
/// probes, not just buried in logs. The two backends implement the same
/// query surface and are never mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// The configured on-disk database.
    Primary,
    /// In-process seeded stand-in; degraded-mode operation and testing.
    FallbackMemory,
}

// =============================================================================
// Store Handle
// =============================================================================

/// An isolated, tenant-scoped view over the shared pool.
///
/// Cheap to clone (pool handle + namespace key). All repositories created
/// from a handle scope every query to its `tenant_id`.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pool: SqlitePool,
    tenant_id: String,
    backend: StoreBackend,
}

impl StoreHandle {
    /// The namespace this handle is bound to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Which backend the handle reads/writes.
    pub fn backend(&self) -> StoreBackend {
        self.backend
    }

    /// Whether this is the system namespace handle.
    pub fn is_system(&self) -> bool {
        self.tenant_id == SYSTEM_TENANT_ID
    }

    /// Returns a reference to the underlying pool.
    ///
    /// For advanced queries not covered by repositories. Prefer repository
    /// methods: raw pool access bypasses tenant scoping.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the shop directory repository.
    ///
    /// Shops are system-scoped; this is meaningful on the handle from
    /// [`ConnectionRouter::resolve_system`].
    pub fn shops(&self) -> ShopRepository {
        ShopRepository::new(self.pool.clone())
    }

    /// Returns the user repository for this namespace.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Returns the product repository for this namespace.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Returns the inventory ledger for this namespace.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Returns the sale repository for this namespace.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), self.tenant_id.clone())
    }

    /// Returns the return repository for this namespace.
    pub fn returns(&self) -> ReturnRepository {
        ReturnRepository::new(self.pool.clone(), self.tenant_id.clone())
    }
}

// =============================================================================
// Router Health
// =============================================================================

/// Snapshot for health/readiness endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RouterHealth {
    /// Primary or fallback. Degraded mode MUST be visible here.
    pub backend: StoreBackend,
    /// Whether the store currently answers queries.
    pub reachable: bool,
    /// Number of tenant handles in the process-wide cache.
    pub cached_handles: usize,
}

// =============================================================================
// Connection Router
// =============================================================================

/// Maps tenant identifiers to isolated store handles.
///
/// One instance per process, owned by the dependency-injection root; no
/// ambient singletons. Construct with [`ConnectionRouter::connect`], share
/// behind an `Arc`, and call [`ConnectionRouter::close`] on shutdown.
#[derive(Debug)]
pub struct ConnectionRouter {
    /// The single long-lived pool; all namespaces share it.
    pool: SqlitePool,
    backend: StoreBackend,
    /// Process-wide handle cache. Concurrent lookup/insert with
    /// initialize-once-per-key semantics (double-checked under the write
    /// lock). No await is ever held across this lock.
    handles: RwLock<HashMap<String, StoreHandle>>,
    /// Resolve counter driving log sampling.
    resolves: AtomicU64,
    closed: AtomicBool,
}

impl ConnectionRouter {
    /// Establishes the long-lived storage connection.
    ///
    /// ## What This Does
    /// 1. Opens a bounded pool against the configured database file
    ///    (WAL mode, NORMAL synchronous, foreign keys on)
    /// 2. If that fails and `fallback_to_memory` is set, opens an
    ///    in-memory store instead, runs migrations, seeds demo data, and
    ///    flags the backend as [`StoreBackend::FallbackMemory`]
    /// 3. Runs migrations (if enabled)
    pub async fn connect(config: RouterConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing storage router"
        );

        let (pool, backend) = match Self::open_pool(&config, &config.database_path).await {
            Ok(pool) => (pool, StoreBackend::Primary),
            Err(err) if config.fallback_to_memory => {
                warn!(
                    error = %err,
                    "Primary store unreachable, degrading to in-memory fallback"
                );
                let pool = Self::open_pool(&config, &PathBuf::from(":memory:")).await?;
                (pool, StoreBackend::FallbackMemory)
            }
            Err(err) => return Err(err),
        };

        if config.run_migrations {
            migrations::run_migrations(&pool).await?;
        }

        if backend == StoreBackend::FallbackMemory {
            crate::seed::seed_demo_data(&pool).await?;
            warn!("Fallback store active: data will NOT survive restart");
        }

        info!(
            max_connections = config.max_connections,
            backend = ?backend,
            "Storage router ready"
        );

        Ok(ConnectionRouter {
            pool,
            backend,
            handles: RwLock::new(HashMap::new()),
            resolves: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Builds the pool for one target path.
    async fn open_pool(config: &RouterConfig, path: &PathBuf) -> DbResult<SqlitePool> {
        // sqlite://path with mode=rwc creates the file if it doesn't exist.
        // In-memory connections must cap the pool at one connection; each
        // pooled connection would otherwise get a private empty database.
        let in_memory = path.as_os_str() == ":memory:";
        let connect_url = format!("sqlite://{}?mode=rwc", path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let max_connections = if in_memory { 1 } else { config.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(config.min_connections.min(max_connections))
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        Ok(pool)
    }

    /// Resolves a tenant identifier to its isolated store handle.
    ///
    /// Pure mapping: no physical connection is opened per tenant. The
    /// caller is responsible for checking the shop's lifecycle status
    /// separately (see plaza-auth's tenant gate); existence of a handle
    /// does not imply the shop is active.
    ///
    /// ## Errors
    /// - `NotConnected` - router already closed
    /// - `InvalidTenant` - empty or malformed identifier
    pub fn resolve(&self, tenant_id: &str) -> DbResult<StoreHandle> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::NotConnected);
        }

        if validate_tenant_id(tenant_id).is_err() {
            return Err(DbError::InvalidTenant(tenant_id.to_string()));
        }

        let n = self.resolves.fetch_add(1, Ordering::Relaxed);

        // Fast path: read lock, cache hit. Logged only at a sampled
        // fraction to keep resolve churn out of the logs.
        // Lock poisoning degrades to taking the inner value: the cache
        // holds only cheap clonable handles, never partial state.
        {
            let read = self
                .handles
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(handle) = read.get(tenant_id) {
                if n % RESOLVE_LOG_SAMPLE == 0 {
                    debug!(tenant_id = %tenant_id, resolves = n, "Tenant handle cache hit (sampled)");
                }
                return Ok(handle.clone());
            }
        }

        // Slow path: double-checked insert under the write lock so two
        // racing first-resolves still initialize exactly one handle.
        let mut handles = self
            .handles
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = handles.get(tenant_id) {
            return Ok(handle.clone());
        }

        let handle = StoreHandle {
            pool: self.pool.clone(),
            tenant_id: tenant_id.to_string(),
            backend: self.backend,
        };
        handles.insert(tenant_id.to_string(), handle.clone());
        info!(tenant_id = %tenant_id, "Tenant namespace resolved");

        Ok(handle)
    }

    /// Resolves the system namespace (shops directory, super-admin users).
    pub fn resolve_system(&self) -> DbResult<StoreHandle> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::NotConnected);
        }

        Ok(StoreHandle {
            pool: self.pool.clone(),
            tenant_id: SYSTEM_TENANT_ID.to_string(),
            backend: self.backend,
        })
    }

    /// Which backend this router serves from.
    pub fn backend(&self) -> StoreBackend {
        self.backend
    }

    /// Health snapshot for readiness endpoints.
    ///
    /// Degraded (fallback) operation is reported here, not only logged.
    pub async fn health(&self) -> RouterHealth {
        let reachable = !self.closed.load(Ordering::Acquire)
            && sqlx::query("SELECT 1").execute(&self.pool).await.is_ok();

        RouterHealth {
            backend: self.backend,
            reachable,
            cached_handles: self
                .handles
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
        }
    }

    /// Closes the pool. Subsequent `resolve` calls fail `NotConnected`.
    ///
    /// ## When To Call
    /// On process shutdown, from the owner of the router.
    pub async fn close(&self) {
        info!("Closing storage router");
        self.closed.store(true, Ordering::Release);
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_router() {
        let router = ConnectionRouter::connect(RouterConfig::in_memory())
            .await
            .unwrap();

        assert_eq!(router.backend(), StoreBackend::Primary);
        let health = router.health().await;
        assert!(health.reachable);
    }

    #[tokio::test]
    async fn test_resolve_validates_tenant_id() {
        let router = ConnectionRouter::connect(RouterConfig::in_memory())
            .await
            .unwrap();

        assert!(matches!(router.resolve(""), Err(DbError::InvalidTenant(_))));
        assert!(matches!(
            router.resolve("shop/1"),
            Err(DbError::InvalidTenant(_))
        ));
        assert!(router.resolve("shop-1").is_ok());
    }

    #[tokio::test]
    async fn test_resolve_caches_handles() {
        let router = ConnectionRouter::connect(RouterConfig::in_memory())
            .await
            .unwrap();

        let a = router.resolve("shop-1").unwrap();
        let b = router.resolve("shop-1").unwrap();
        assert_eq!(a.tenant_id(), b.tenant_id());
        assert_eq!(router.health().await.cached_handles, 1);

        router.resolve("shop-2").unwrap();
        assert_eq!(router.health().await.cached_handles, 2);
    }

    #[tokio::test]
    async fn test_resolve_system_namespace() {
        let router = ConnectionRouter::connect(RouterConfig::in_memory())
            .await
            .unwrap();

        let system = router.resolve_system().unwrap();
        assert!(system.is_system());
        assert_eq!(system.tenant_id(), SYSTEM_TENANT_ID);
    }

    #[tokio::test]
    async fn test_closed_router_rejects_resolve() {
        let router = ConnectionRouter::connect(RouterConfig::in_memory())
            .await
            .unwrap();

        router.close().await;
        assert!(matches!(router.resolve("shop-1"), Err(DbError::NotConnected)));
        assert!(matches!(router.resolve_system(), Err(DbError::NotConnected)));
        assert!(!router.health().await.reachable);
    }

    #[tokio::test]
    async fn test_fallback_when_primary_unreachable() {
        // Parent directory doesn't exist, so SQLite cannot create the file
        let config = RouterConfig::new("/nonexistent-plaza-dir/deeper/plaza.db")
            .fallback_to_memory(true);

        let router = ConnectionRouter::connect(config).await.unwrap();
        assert_eq!(router.backend(), StoreBackend::FallbackMemory);

        let health = router.health().await;
        assert_eq!(health.backend, StoreBackend::FallbackMemory);
        assert!(health.reachable);

        // Fallback is seeded: the demo shop is resolvable and present
        let system = router.resolve_system().unwrap();
        let shops = system.shops().list().await.unwrap();
        assert!(!shops.is_empty());
    }

    #[tokio::test]
    async fn test_no_fallback_fails_hard() {
        let config = RouterConfig::new("/nonexistent-plaza-dir/deeper/plaza.db");
        let result = ConnectionRouter::connect(config).await;
        assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
    }
}
