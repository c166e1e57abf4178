//! Postgres backend: `configs(user_id, config)` and `group_configs(chat_id, config_owner_id)`

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, Instrument};

use super::Storage;
use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};
use crate::keywords::{ChatId, KeywordResponse, UserConfig, UserId};
use crate::observability::db_span;

/// Open a connection pool using the configured limits
pub async fn connect(config: &DatabaseConfig) -> AppResult<PgPool> {
    info!(max_connections = config.max_connections, "Connecting to PostgreSQL");

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> AppResult<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS configs (
            user_id BIGINT PRIMARY KEY,
            config JSONB NOT NULL DEFAULT '{}'::jsonb
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS group_configs (
            chat_id BIGINT PRIMARY KEY,
            config_owner_id BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// [`Storage`] backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn load_configs(&self) -> Result<HashMap<UserId, UserConfig>> {
        let rows = sqlx::query("SELECT user_id, config::text FROM configs")
            .fetch_all(&self.pool)
            .instrument(db_span("load_configs", "configs"))
            .await
            .context("Failed to load keyword configs")?;

        let configs: HashMap<UserId, UserConfig> = rows
            .into_iter()
            .map(|row| {
                let user_id: i64 = row.get(0);
                let raw: String = row.get(1);
                (user_id, UserConfig::from_str_lenient(user_id, &raw))
            })
            .collect();

        debug!(users = configs.len(), "Loaded keyword configs");
        Ok(configs)
    }

    async fn load_config(&self, user_id: UserId) -> Result<UserConfig> {
        let row = sqlx::query("SELECT config::text FROM configs WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("load_config", "configs"))
            .await
            .context("Failed to load keyword config")?;

        Ok(match row {
            Some(row) => {
                let raw: String = row.get(0);
                UserConfig::from_str_lenient(user_id, &raw)
            }
            None => {
                debug!(user_id = %user_id, "No keyword config found");
                UserConfig::default()
            }
        })
    }

    async fn save_config(&self, user_id: UserId, config: &UserConfig) -> Result<()> {
        let document = serde_json::to_string(config).context("Failed to encode keyword config")?;

        sqlx::query(
            "INSERT INTO configs (user_id, config) VALUES ($1, $2::jsonb)
             ON CONFLICT (user_id) DO UPDATE SET config = EXCLUDED.config",
        )
        .bind(user_id)
        .bind(document)
        .execute(&self.pool)
        .instrument(db_span("save_config", "configs"))
        .await
        .context("Failed to save keyword config")?;

        debug!(user_id = %user_id, keywords = config.len(), "Keyword config saved");
        Ok(())
    }

    async fn set_keyword(
        &self,
        user_id: UserId,
        keyword: &str,
        response: &KeywordResponse,
    ) -> Result<()> {
        let value = serde_json::to_string(response).context("Failed to encode keyword response")?;

        // Merge in one statement so concurrent edits for the same user both land.
        // A row holding a non-object document is reset first.
        sqlx::query(
            "INSERT INTO configs (user_id, config) VALUES ($1, jsonb_build_object($2::text, $3::jsonb))
             ON CONFLICT (user_id) DO UPDATE SET config =
                 (CASE WHEN jsonb_typeof(configs.config) = 'object' THEN configs.config ELSE '{}'::jsonb END)
                 || EXCLUDED.config",
        )
        .bind(user_id)
        .bind(keyword)
        .bind(value)
        .execute(&self.pool)
        .instrument(db_span("set_keyword", "configs"))
        .await
        .context("Failed to store keyword")?;

        debug!(user_id = %user_id, keyword = %keyword, kind = response.kind(), "Keyword stored");
        Ok(())
    }

    async fn delete_keyword(&self, user_id: UserId, keyword: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE configs SET config = config - $2::text
             WHERE user_id = $1 AND jsonb_typeof(config) = 'object' AND config ? $2::text",
        )
        .bind(user_id)
        .bind(keyword)
        .execute(&self.pool)
        .instrument(db_span("delete_keyword", "configs"))
        .await
        .context("Failed to delete keyword")?;

        let deleted = result.rows_affected() > 0;
        debug!(user_id = %user_id, keyword = %keyword, deleted, "Keyword delete finished");
        Ok(deleted)
    }

    async fn load_group_bindings(&self) -> Result<HashMap<ChatId, UserId>> {
        let rows = sqlx::query("SELECT chat_id, config_owner_id FROM group_configs")
            .fetch_all(&self.pool)
            .instrument(db_span("load_group_bindings", "group_configs"))
            .await
            .context("Failed to load group bindings")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<i64, _>(0), row.get::<i64, _>(1)))
            .collect())
    }

    async fn group_owner(&self, chat_id: ChatId) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT config_owner_id FROM group_configs WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("group_owner", "group_configs"))
            .await
            .context("Failed to read group binding")?;

        Ok(row.map(|row| row.get::<i64, _>(0)))
    }

    async fn bind_group(&self, chat_id: ChatId, owner_id: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO group_configs (chat_id, config_owner_id) VALUES ($1, $2)
             ON CONFLICT (chat_id) DO UPDATE SET config_owner_id = EXCLUDED.config_owner_id",
        )
        .bind(chat_id)
        .bind(owner_id)
        .execute(&self.pool)
        .instrument(db_span("bind_group", "group_configs"))
        .await
        .context("Failed to save group binding")?;

        info!(chat_id = %chat_id, owner_id = %owner_id, "Group bound to owner");
        Ok(())
    }
}
