//! Seeds a local database with demo data.
//!
//! ```bash
//! DATABASE_PATH=plaza.db cargo run -p plaza-db --bin seed
//! ```

use plaza_db::router::{ConnectionRouter, RouterConfig};
use plaza_db::seed::seed_demo_data;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "plaza.db".to_string());
    info!(path = %path, "Seeding database");

    let router = ConnectionRouter::connect(RouterConfig::new(&path)).await?;
    seed_demo_data(router.resolve_system()?.pool()).await?;
    router.close().await;

    info!("Done");
    Ok(())
}
