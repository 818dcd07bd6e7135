//! Stream event repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{EventType, StreamEventDbModel};

/// Event repository trait.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &StreamEventDbModel) -> Result<()>;
    async fn mark_notified(&self, event_id: &str) -> Result<()>;
    /// Whether an event of this type was already recorded for the session.
    async fn exists_for_session(&self, session_id: &str, event_type: EventType) -> Result<bool>;
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<StreamEventDbModel>>;
}

/// SQLx implementation of EventRepository.
pub struct SqlxEventRepository {
    pool: SqlitePool,
}

impl SqlxEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &StreamEventDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_events (
                id, session_id, event_type, viewer_count, detected_at, summary, notified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(event.viewer_count)
        .bind(&event.detected_at)
        .bind(&event.summary)
        .bind(event.notified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_notified(&self, event_id: &str) -> Result<()> {
        sqlx::query("UPDATE stream_events SET notified = 1 WHERE id = ?")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists_for_session(&self, session_id: &str, event_type: EventType) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM stream_events WHERE session_id = ? AND event_type = ?",
        )
        .bind(session_id)
        .bind(event_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<StreamEventDbModel>> {
        let events = sqlx::query_as::<_, StreamEventDbModel>(
            "SELECT * FROM stream_events WHERE session_id = ? ORDER BY detected_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
