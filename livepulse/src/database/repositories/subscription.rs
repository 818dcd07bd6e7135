//! Subscription repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{EventType, SubscriptionDbModel};

/// Subscription repository trait.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, subscription: &SubscriptionDbModel) -> Result<()>;
    /// Whether any active subscription covers this event for this channel,
    /// either channel-specific or global.
    async fn exists_active_for(&self, event_type: EventType, channel_id: &str) -> Result<bool>;
    /// Active subscriptions covering this event for this channel, specific and
    /// global alike.
    async fn list_active_for(
        &self,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<Vec<SubscriptionDbModel>>;
}

/// SQLx implementation of SubscriptionRepository.
pub struct SqlxSubscriptionRepository {
    pool: SqlitePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn create(&self, subscription: &SubscriptionDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, discord_channel_id, streamer_channel_id, event_type,
                keywords, active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.discord_channel_id)
        .bind(&subscription.streamer_channel_id)
        .bind(&subscription.event_type)
        .bind(&subscription.keywords)
        .bind(subscription.active)
        .bind(&subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists_active_for(&self, event_type: EventType, channel_id: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE active = 1 AND event_type = ?
              AND (streamer_channel_id IS NULL OR streamer_channel_id = ?)
            "#,
        )
        .bind(event_type.as_str())
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_active_for(
        &self,
        event_type: EventType,
        channel_id: &str,
    ) -> Result<Vec<SubscriptionDbModel>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionDbModel>(
            r#"
            SELECT * FROM subscriptions
            WHERE active = 1 AND event_type = ?
              AND (streamer_channel_id IS NULL OR streamer_channel_id = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_type.as_str())
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }
}
