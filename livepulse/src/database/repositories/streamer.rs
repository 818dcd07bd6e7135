//! Streamer repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::StreamerDbModel;

/// Streamer repository trait.
#[async_trait]
pub trait StreamerRepository: Send + Sync {
    async fn get_by_channel_id(&self, channel_id: &str) -> Result<Option<StreamerDbModel>>;
    /// Upsert on the channel-id natural key; refreshes the nickname on conflict.
    async fn get_or_create(
        &self,
        channel_id: &str,
        nickname: &str,
        initial_average: i64,
    ) -> Result<StreamerDbModel>;
    async fn set_live(&self, channel_id: &str, is_live: bool) -> Result<()>;
    async fn update_average_viewers(&self, channel_id: &str, average: i64) -> Result<()>;
}

/// SQLx implementation of StreamerRepository.
pub struct SqlxStreamerRepository {
    pool: SqlitePool,
}

impl SqlxStreamerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamerRepository for SqlxStreamerRepository {
    async fn get_by_channel_id(&self, channel_id: &str) -> Result<Option<StreamerDbModel>> {
        let streamer =
            sqlx::query_as::<_, StreamerDbModel>("SELECT * FROM streamers WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(streamer)
    }

    async fn get_or_create(
        &self,
        channel_id: &str,
        nickname: &str,
        initial_average: i64,
    ) -> Result<StreamerDbModel> {
        let candidate =
            StreamerDbModel::new(channel_id, nickname).with_average_viewers(initial_average);

        sqlx::query(
            r#"
            INSERT INTO streamers (
                id, channel_id, nickname, is_live, average_viewer_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                nickname = excluded.nickname,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.channel_id)
        .bind(&candidate.nickname)
        .bind(candidate.is_live)
        .bind(candidate.average_viewer_count)
        .bind(&candidate.created_at)
        .bind(&candidate.updated_at)
        .execute(&self.pool)
        .await?;

        let streamer =
            sqlx::query_as::<_, StreamerDbModel>("SELECT * FROM streamers WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(streamer)
    }

    async fn set_live(&self, channel_id: &str, is_live: bool) -> Result<()> {
        sqlx::query("UPDATE streamers SET is_live = ?, updated_at = ? WHERE channel_id = ?")
            .bind(is_live)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_average_viewers(&self, channel_id: &str, average: i64) -> Result<()> {
        sqlx::query(
            "UPDATE streamers SET average_viewer_count = ?, updated_at = ? WHERE channel_id = ?",
        )
        .bind(average)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
