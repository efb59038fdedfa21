//! Database pool construction and migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::StoreResult;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: "postgres://localhost/vidpipe".to_string(),
            max_connections: 100,
            min_connections: 25,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            dsn: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/vidpipe".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
            acquire_timeout: Duration::from_secs(
                std::env::var("DB_ACQUIRE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// Connect a pool and run pending migrations.
pub async fn connect(config: &DbConfig) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.dsn)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

    info!(
        "Database pool ready (max {}, min {})",
        config.max_connections, config.min_connections
    );
    Ok(pool)
}
