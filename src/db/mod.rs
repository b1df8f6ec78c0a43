pub mod repositories;
pub mod models;
mod error;
mod pagination;

use sqlx::postgres::{PgPool, PgPoolOptions};
use anyhow::Result;
use crate::config::DatabaseConfig;

pub use error::DatabaseError;
pub use models::*;
pub use pagination::Pagination;

/// Initialize the database connection pool and apply pending migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.unwrap_or(10))
        .min_connections(config.min_connections.unwrap_or(1))
        .connect(&config.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(DatabaseError::from)?;

    Ok(pool)
}
