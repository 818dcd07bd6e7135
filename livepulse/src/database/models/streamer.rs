//! Streamer database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A broadcaster known to the system, keyed by its platform channel id.
/// Created lazily on first sighting in the feed and updated every cycle.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StreamerDbModel {
    pub id: String,
    /// Natural key on the external platform.
    pub channel_id: String,
    pub nickname: String,
    pub is_live: bool,
    /// Rolling average viewer count across sessions; gates notifications.
    pub average_viewer_count: i64,
    /// ISO 8601 timestamps.
    pub created_at: String,
    pub updated_at: String,
}

impl StreamerDbModel {
    pub fn new(channel_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            nickname: nickname.into(),
            is_live: false,
            average_viewer_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_average_viewers(mut self, average: i64) -> Self {
        self.average_viewer_count = average;
        self
    }
}
