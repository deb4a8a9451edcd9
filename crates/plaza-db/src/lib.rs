//! # plaza-db: Storage Layer for Plaza POS
//!
//! SQLite persistence, tenant routing, and repository implementations.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          plaza-db                                       │
//! │                                                                         │
//! │  ┌────────────────┐                                                    │
//! │  │ ConnectionRouter│ ── resolve(tenant) ──► StoreHandle                │
//! │  │  · one pool     │                           │                        │
//! │  │  · handle cache │                           ▼                        │
//! │  │  · mem fallback │    ┌──────────────────────────────────────────┐   │
//! │  └────────────────┘    │ Repositories (tenant-scoped)             │   │
//! │                        │  shops · users · products · inventory    │   │
//! │  ┌────────────────┐    │  sales · returns                         │   │
//! │  │ Migrations      │    └──────────────────────────────────────────┘   │
//! │  │  (embedded SQL) │                                                   │
//! │  └────────────────┘    Inventory mutations are guarded conditional    │
//! │                        updates; never read-then-write.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use plaza_db::router::{ConnectionRouter, RouterConfig};
//!
//! let router = ConnectionRouter::connect(RouterConfig::new("plaza.db")).await?;
//! let store = router.resolve("shop-42")?;
//! let product = store.products().get_by_sku("COLA-330").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod repository;
pub mod router;
pub mod seed;

pub use error::{DbError, DbResult};
pub use repository::inventory::{InventoryRepository, MutationOutcome};
pub use repository::product::ProductRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRepository;
pub use repository::shop::ShopRepository;
pub use repository::user::UserRepository;
pub use router::{ConnectionRouter, RouterConfig, RouterHealth, StoreBackend, StoreHandle};
