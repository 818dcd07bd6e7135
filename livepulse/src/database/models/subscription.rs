//! Subscription database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::EventType;

/// A notification subscription for one Discord channel.
///
/// `streamer_channel_id = None` means a global (all-streamers) subscription.
/// Uniqueness: at most one active row per (channel, streamer-or-global, event
/// type), enforced by a partial unique index.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubscriptionDbModel {
    pub id: String,
    pub discord_channel_id: String,
    pub streamer_channel_id: Option<String>,
    pub event_type: String,
    /// JSON array of lowercase keywords; only meaningful for TOPIC.
    pub keywords: String,
    pub active: bool,
    pub created_at: String,
}

impl SubscriptionDbModel {
    pub fn new(
        discord_channel_id: impl Into<String>,
        streamer_channel_id: Option<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            discord_channel_id: discord_channel_id.into(),
            streamer_channel_id,
            event_type: event_type.as_str().to_string(),
            keywords: "[]".to_string(),
            active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        let lowered: Vec<String> = keywords.iter().map(|k| k.trim().to_lowercase()).collect();
        self.keywords = serde_json::to_string(&lowered).unwrap_or_else(|_| "[]".to_string());
        self
    }

    /// Parse the keyword JSON column.
    pub fn keyword_list(&self) -> Vec<String> {
        serde_json::from_str(&self.keywords).unwrap_or_default()
    }
}
