//! Entry cursor store.
//!
//! Discovery writes its result into a staging slot and promotes it in one
//! transaction, so the fast scan never observes a half-written cursor list.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::{WritePool, begin_immediate};

const ACTIVE_SLOT: &str = "current";
const STAGING_SLOT: &str = "next";

/// Store for the ordered entry cursors produced by a discovery walk.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Active entry cursors in walk order. Index 0 is the empty-string
    /// cursor standing for the feed's first page.
    async fn load_entries(&self) -> Result<Vec<String>>;
    /// Overwrite the staging slot with a freshly discovered cursor list.
    async fn stage_entries(&self, entries: &[String]) -> Result<()>;
    /// Atomically replace the active slot with the staged one.
    async fn promote_staged(&self) -> Result<()>;
}

/// SQLx implementation of CursorStore.
pub struct SqlxCursorStore {
    pool: SqlitePool,
    write_pool: WritePool,
}

impl SqlxCursorStore {
    pub fn new(pool: SqlitePool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }
}

#[async_trait]
impl CursorStore for SqlxCursorStore {
    async fn load_entries(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT cursor FROM entry_cursors WHERE slot = ? ORDER BY idx ASC")
                .bind(ACTIVE_SLOT)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(cursor,)| cursor).collect())
    }

    async fn stage_entries(&self, entries: &[String]) -> Result<()> {
        let mut tx = begin_immediate(&self.write_pool).await?;

        sqlx::query("DELETE FROM entry_cursors WHERE slot = ?")
            .bind(STAGING_SLOT)
            .execute(&mut *tx)
            .await?;

        for (idx, cursor) in entries.iter().enumerate() {
            sqlx::query("INSERT INTO entry_cursors (slot, idx, cursor) VALUES (?, ?, ?)")
                .bind(STAGING_SLOT)
                .bind(idx as i64)
                .bind(cursor)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn promote_staged(&self) -> Result<()> {
        let mut tx = begin_immediate(&self.write_pool).await?;

        sqlx::query("DELETE FROM entry_cursors WHERE slot = ?")
            .bind(ACTIVE_SLOT)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE entry_cursors SET slot = ? WHERE slot = ?")
            .bind(ACTIVE_SLOT)
            .bind(STAGING_SLOT)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn test_store() -> SqlxCursorStore {
        // Single connection so the in-memory database is shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqlxCursorStore::new(pool.clone(), pool)
    }

    #[tokio::test]
    async fn test_stage_then_promote_replaces_active() {
        let store = test_store().await;
        let first = vec!["".to_string(), "a".to_string(), "b".to_string()];
        store.stage_entries(&first).await.unwrap();
        store.promote_staged().await.unwrap();
        assert_eq!(store.load_entries().await.unwrap(), first);

        let second = vec!["".to_string(), "x".to_string()];
        store.stage_entries(&second).await.unwrap();
        store.promote_staged().await.unwrap();
        assert_eq!(store.load_entries().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_staging_does_not_touch_active() {
        let store = test_store().await;
        let active = vec!["".to_string()];
        store.stage_entries(&active).await.unwrap();
        store.promote_staged().await.unwrap();

        store.stage_entries(&["other".to_string()]).await.unwrap();
        assert_eq!(store.load_entries().await.unwrap(), active);
    }
}
