//! # Database Migrations
//!
//! Schema migrations embedded at compile time.
//!
//! ## How It Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Migration System                                     │
//! │                                                                         │
//! │  Build time:                                                           │
//! │    migrations/sqlite/*.sql ──► embedded into the binary                 │
//! │                                                                         │
//! │  Runtime (router connect):                                             │
//! │    1. Create _sqlx_migrations table if missing                         │
//! │    2. Compare applied versions against embedded set                    │
//! │    3. Apply pending migrations in order, each in a transaction         │
//! │                                                                         │
//! │  Idempotent: running twice applies nothing the second time.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations, compiled from `migrations/sqlite/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations.
///
/// Called automatically on router connect (unless disabled in config).
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Running database migrations");
    MIGRATOR.run(pool).await?;
    info!("Migrations complete");
    Ok(())
}

/// Returns the number of applied migrations.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_migrations_apply_and_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        let applied = migration_status(&pool).await.unwrap();
        assert!(applied >= 1);

        // Second run is a no-op
        run_migrations(&pool).await.unwrap();
        assert_eq!(migration_status(&pool).await.unwrap(), applied);
    }
}
