//! Known-live set and per-session content snapshots.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::{WritePool, begin_immediate};

/// Store for the set of channels currently believed live, plus the last
/// notified content snapshot per session.
#[async_trait]
pub trait LiveStateStore: Send + Sync {
    async fn live_ids(&self) -> Result<HashSet<String>>;
    /// Apply one fast-cycle diff atomically: channels that started are added,
    /// channels that ended are removed.
    async fn apply_diff(&self, started: &[String], ended: &[String]) -> Result<()>;
    /// Last notified snapshot payload for a session, if present and not
    /// expired.
    async fn get_snapshot(&self, session_id: &str) -> Result<Option<String>>;
    async fn save_snapshot(&self, session_id: &str, payload: &str, ttl: Duration) -> Result<()>;
    async fn delete_snapshot(&self, session_id: &str) -> Result<()>;
    /// Drop expired snapshots; returns the number removed.
    async fn prune_expired(&self) -> Result<u64>;
}

/// SQLx implementation of LiveStateStore.
pub struct SqlxLiveStateStore {
    pool: SqlitePool,
    write_pool: WritePool,
}

impl SqlxLiveStateStore {
    pub fn new(pool: SqlitePool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }
}

#[async_trait]
impl LiveStateStore for SqlxLiveStateStore {
    async fn live_ids(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT channel_id FROM live_set")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn apply_diff(&self, started: &[String], ended: &[String]) -> Result<()> {
        if started.is_empty() && ended.is_empty() {
            return Ok(());
        }

        let mut tx = begin_immediate(&self.write_pool).await?;

        for channel_id in started {
            sqlx::query("INSERT OR IGNORE INTO live_set (channel_id) VALUES (?)")
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
        }
        for channel_id in ended {
            sqlx::query("DELETE FROM live_set WHERE channel_id = ?")
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_snapshot(&self, session_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM session_snapshots WHERE session_id = ? AND expires_at > ?",
        )
        .bind(session_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(payload,)| payload))
    }

    async fn save_snapshot(&self, session_id: &str, payload: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let expires_at = (chrono::Utc::now() + ttl).to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO session_snapshots (session_id, payload, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(session_id)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_snapshot(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_snapshots WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_snapshots WHERE expires_at <= ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
