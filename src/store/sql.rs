use crate::error::AppResult;
use crate::store::models::StoredGuildConfig;
use crate::store::ConfigBackend;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::info;

pub type DbPool = Pool<Sqlite>;

/// Relational backend over the `guild_configs` table
#[derive(Debug, Clone)]
pub struct SqlBackend {
    pool: DbPool,
}

impl SqlBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigBackend for SqlBackend {
    fn name(&self) -> &'static str {
        "sql"
    }

    async fn load(&self, guild_id: &str) -> AppResult<Option<StoredGuildConfig>> {
        let record = sqlx::query_as::<_, StoredGuildConfig>(
            r#"
            SELECT guild_id, channel_id, role_id, created_at, updated_at
            FROM guild_configs
            WHERE guild_id = ?
            "#,
        )
        .bind(guild_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn save(&self, record: &StoredGuildConfig) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO guild_configs (guild_id, channel_id, role_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                channel_id = excluded.channel_id,
                role_id = excluded.role_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.guild_id)
        .bind(&record.channel_id)
        .bind(&record.role_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, guild_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM guild_configs WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn guild_ids(&self) -> AppResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT guild_id FROM guild_configs ORDER BY guild_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
pub async fn setup_test_db() -> DbPool {
    use sqlx::sqlite::SqlitePoolOptions;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_db(&pool).await.expect("Failed to init database");
    pool
}

/// Initialize database with migrations
pub async fn init_db(pool: &DbPool) -> AppResult<()> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guild_configs (
            guild_id TEXT PRIMARY KEY NOT NULL,
            channel_id TEXT,
            role_id TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(guild_id: &str, role: &str) -> StoredGuildConfig {
        let now = Utc::now();
        StoredGuildConfig {
            guild_id: guild_id.to_string(),
            channel_id: Some("sealed-channel".to_string()),
            role_id: role.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let backend = SqlBackend::new(setup_test_db().await);
        let rec = record("g1", "sealed-role");
        backend.save(&rec).await.unwrap();

        let loaded = backend.load("g1").await.unwrap().unwrap();
        assert_eq!(loaded.role_id, "sealed-role");
        assert_eq!(loaded.channel_id.as_deref(), Some("sealed-channel"));
    }

    #[tokio::test]
    async fn test_load_nonexistent_returns_none() {
        let backend = SqlBackend::new(setup_test_db().await);
        assert!(backend.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_conflict_keeps_created_at() {
        let backend = SqlBackend::new(setup_test_db().await);
        let first = record("g1", "role-a");
        backend.save(&first).await.unwrap();

        let mut second = record("g1", "role-b");
        second.created_at = first.created_at + Duration::days(1);
        second.channel_id = None;
        backend.save(&second).await.unwrap();

        let loaded = backend.load("g1").await.unwrap().unwrap();
        assert_eq!(loaded.role_id, "role-b");
        assert!(loaded.channel_id.is_none());
        assert_eq!(loaded.created_at, first.created_at);
        assert_eq!(backend.guild_ids().await.unwrap(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let backend = SqlBackend::new(setup_test_db().await);
        backend.save(&record("g1", "role")).await.unwrap();

        assert!(backend.remove("g1").await.unwrap());
        assert!(!backend.remove("g1").await.unwrap());
        assert!(backend.load("g1").await.unwrap().is_none());
    }
}
