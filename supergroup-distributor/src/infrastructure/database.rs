//! # 数据库连接管理

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use supergroup_core::config::PostgresInstanceConfig;
use tracing::info;

/// 按配置创建 PostgreSQL 连接池并验证连通性
pub async fn create_db_pool(config: &PostgresInstanceConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.unwrap_or(20))
        .min_connections(config.min_connections.unwrap_or(2))
        .acquire_timeout(Duration::from_millis(
            config.acquire_timeout_ms.unwrap_or(30_000),
        ))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await
        .context("failed to connect to postgres")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("postgres connection test failed")?;

    info!("Database connection pool created");
    Ok(pool)
}
