//! Notification delivery record.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit record of one delivery attempt.
///
/// Persisted unconditionally after every attempt, success or failure; failures
/// carry the error detail and are never auto-retried.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationDbModel {
    pub id: String,
    pub event_type: String,
    /// Discord channel the message was addressed to.
    pub receiver_id: String,
    pub message: String,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl NotificationDbModel {
    pub fn delivered(
        event_type: impl Into<String>,
        receiver_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            receiver_id: receiver_id.into(),
            message: message.into(),
            success: true,
            error: None,
            sent_at: Some(now.clone()),
            created_at: now,
        }
    }

    pub fn failed(
        event_type: impl Into<String>,
        receiver_id: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            receiver_id: receiver_id.into(),
            message: message.into(),
            success: false,
            error: Some(error.into()),
            sent_at: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
