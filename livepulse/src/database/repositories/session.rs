//! Session and metrics repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{StreamMetricsDbModel, StreamSessionDbModel};
use crate::database::{WritePool, begin_immediate};
use crate::{Error, Result};

/// Session repository trait.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<StreamSessionDbModel>;
    /// Open session (ended_at null) for a channel, if one exists.
    async fn get_active_for_channel(&self, channel_id: &str)
    -> Result<Option<StreamSessionDbModel>>;
    async fn create(&self, session: &StreamSessionDbModel) -> Result<()>;
    async fn append_metrics(&self, metrics: &StreamMetricsDbModel) -> Result<()>;
    async fn list_metrics(&self, session_id: &str) -> Result<Vec<StreamMetricsDbModel>>;
    /// Close the open session for a channel, aggregating its metrics into the
    /// final average and peak viewer counts. Returns the closed session, or
    /// None if the channel had no open session.
    async fn close_active_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<StreamSessionDbModel>>;
}

/// SQLx implementation of SessionRepository.
pub struct SqlxSessionRepository {
    pool: SqlitePool,
    write_pool: WritePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: SqlitePool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn get_by_id(&self, id: &str) -> Result<StreamSessionDbModel> {
        sqlx::query_as::<_, StreamSessionDbModel>("SELECT * FROM stream_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("StreamSession", id))
    }

    async fn get_active_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<StreamSessionDbModel>> {
        let session = sqlx::query_as::<_, StreamSessionDbModel>(
            r#"
            SELECT s.* FROM stream_sessions s
            JOIN streamers st ON st.id = s.streamer_id
            WHERE st.channel_id = ? AND s.ended_at IS NULL
            ORDER BY s.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn create(&self, session: &StreamSessionDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_sessions (
                id, streamer_id, title, category, started_at, ended_at,
                average_viewer_count, peak_viewer_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.streamer_id)
        .bind(&session.title)
        .bind(&session.category)
        .bind(&session.started_at)
        .bind(&session.ended_at)
        .bind(session.average_viewer_count)
        .bind(session.peak_viewer_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_metrics(&self, metrics: &StreamMetricsDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_metrics (
                id, session_id, viewer_count, title, category, tags, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&metrics.id)
        .bind(&metrics.session_id)
        .bind(metrics.viewer_count)
        .bind(&metrics.title)
        .bind(&metrics.category)
        .bind(&metrics.tags)
        .bind(&metrics.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_metrics(&self, session_id: &str) -> Result<Vec<StreamMetricsDbModel>> {
        let metrics = sqlx::query_as::<_, StreamMetricsDbModel>(
            "SELECT * FROM stream_metrics WHERE session_id = ? ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(metrics)
    }

    async fn close_active_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<StreamSessionDbModel>> {
        let mut tx = begin_immediate(&self.write_pool).await?;

        let session = sqlx::query_as::<_, StreamSessionDbModel>(
            r#"
            SELECT s.* FROM stream_sessions s
            JOIN streamers st ON st.id = s.streamer_id
            WHERE st.channel_id = ? AND s.ended_at IS NULL
            ORDER BY s.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = session else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Aggregate recorded samples; a session closed before any sample
        // keeps zero average and peak.
        let (average, peak): (i64, i64) = sqlx::query_as(
            r#"
            SELECT CAST(COALESCE(AVG(viewer_count), 0) AS INTEGER),
                   COALESCE(MAX(viewer_count), 0)
            FROM stream_metrics WHERE session_id = ?
            "#,
        )
        .bind(&session.id)
        .fetch_one(&mut *tx)
        .await?;

        let ended_at = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE stream_sessions
            SET ended_at = ?, average_viewer_count = ?, peak_viewer_count = ?
            WHERE id = ?
            "#,
        )
        .bind(&ended_at)
        .bind(average)
        .bind(peak)
        .bind(&session.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(StreamSessionDbModel {
            ended_at: Some(ended_at),
            average_viewer_count: average,
            peak_viewer_count: peak,
            ..session
        }))
    }
}
