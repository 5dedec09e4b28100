//! Postgres-backed key-value store

use async_trait::async_trait;
use sqlx::PgPool;

use crate::ports::KeyValueStore;
use crate::Result;

#[derive(Clone)]
pub struct PgStore { db: PgPool }

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await.map_err(|e| crate::StorefrontError::Storage(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = $1").bind(key).fetch_optional(&self.db).await?;
        Ok(row.map(|r| r.0))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        sqlx::query("INSERT INTO kv_entries (key, value, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()")
            .bind(key).bind(&value).execute(&self.db).await?;
        Ok(())
    }
}
