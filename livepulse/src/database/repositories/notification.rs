//! Notification audit repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::NotificationDbModel;

/// Notification repository trait.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Append one delivery attempt record, success or failure.
    async fn record(&self, notification: &NotificationDbModel) -> Result<()>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<NotificationDbModel>>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn record(&self, notification: &NotificationDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, event_type, receiver_id, message, success, error, sent_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.event_type)
        .bind(&notification.receiver_id)
        .bind(&notification.message)
        .bind(notification.success)
        .bind(&notification.error)
        .bind(&notification.sent_at)
        .bind(&notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<NotificationDbModel>> {
        let notifications = sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notifications ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }
}
