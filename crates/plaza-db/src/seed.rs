//! # Demo Data Seeding
//!
//! Populates a store with one demo shop, its users, and a small catalog.
//! Used by the `seed` binary for local development and by the router when
//! it degrades to the in-memory fallback (so the degraded process still
//! serves a coherent dataset).
//!
//! Idempotent: seeding an already-seeded store is a no-op.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use plaza_core::{Permission, Product, Role, Shop, ShopStatus, User, SYSTEM_TENANT_ID};

use crate::error::DbResult;
use crate::repository::product::ProductRepository;
use crate::repository::shop::ShopRepository;
use crate::repository::user::UserRepository;

/// Identifier of the seeded demo shop.
pub const DEMO_TENANT_ID: &str = "demo-shop";

/// Seeds the demo dataset. No-op when the demo shop already exists.
///
/// Seeded users carry an empty password hash: credentials are provisioned
/// through the auth layer, not baked into fixtures.
pub async fn seed_demo_data(pool: &SqlitePool) -> DbResult<()> {
    let shops = ShopRepository::new(pool.clone());
    if shops.get(DEMO_TENANT_ID).await.is_ok() {
        info!("Demo data already present, skipping seed");
        return Ok(());
    }

    info!("Seeding demo data");
    let now = Utc::now();

    shops
        .insert(&Shop {
            id: DEMO_TENANT_ID.to_string(),
            name: "Demo Corner Store".to_string(),
            status: ShopStatus::Active,
            subscription_expires_at: now + Duration::days(365),
            owner_email: "owner@demo.example".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let system_users = UserRepository::new(pool.clone(), SYSTEM_TENANT_ID.to_string());
    system_users
        .insert(&User {
            id: Uuid::new_v4().to_string(),
            tenant_id: SYSTEM_TENANT_ID.to_string(),
            name: "Platform Admin".to_string(),
            email: "admin@plaza.example".to_string(),
            role: Role::SuperAdmin,
            permission_overrides: vec![],
            is_active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let users = UserRepository::new(pool.clone(), DEMO_TENANT_ID.to_string());
    users
        .insert(&User {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEMO_TENANT_ID.to_string(),
            name: "Demo Owner".to_string(),
            email: "owner@demo.example".to_string(),
            role: Role::ShopAdmin,
            permission_overrides: vec![],
            is_active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        })
        .await?;
    users
        .insert(&User {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEMO_TENANT_ID.to_string(),
            name: "Demo Cashier".to_string(),
            email: "cashier@demo.example".to_string(),
            role: Role::Staff,
            permission_overrides: vec![Permission::ViewReports],
            is_active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let products = ProductRepository::new(pool.clone(), DEMO_TENANT_ID.to_string());
    let catalog: [(&str, &str, i64, i64, Option<i64>, i64); 4] = [
        ("COLA-330", "Cola 330ml", 40, 99, Some(24), 120),
        ("CHIPS-50", "Potato Chips 50g", 55, 149, Some(12), 60),
        ("BREAD-WH", "Whole Wheat Bread", 120, 250, Some(5), 18),
        ("MILK-1L", "Milk 1L", 90, 180, None, 30),
    ];

    for (sku, name, cost, price, min_stock, qty) in catalog {
        products
            .insert(
                &Product {
                    id: Uuid::new_v4().to_string(),
                    tenant_id: DEMO_TENANT_ID.to_string(),
                    sku: sku.to_string(),
                    name: name.to_string(),
                    category: Some("grocery".to_string()),
                    cost_cents: cost,
                    price_cents: price,
                    unit: Some("pcs".to_string()),
                    min_stock_level: min_stock,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                },
                qty,
            )
            .await?;
    }

    info!(tenant_id = %DEMO_TENANT_ID, "Demo data seeded");
    Ok(())
}
