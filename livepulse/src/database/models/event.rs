//! Stream lifecycle event database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle event types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Start,
    End,
    Topic,
    Hot,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
            Self::Topic => "TOPIC",
            Self::Hot => "HOT",
        }
    }
}

/// A detected lifecycle transition, created transactionally on detection and
/// consumed once by the notification pipeline. Append-only except `notified`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StreamEventDbModel {
    pub id: String,
    pub session_id: String,
    pub event_type: String,
    pub viewer_count: i64,
    pub detected_at: String,
    pub summary: Option<String>,
    pub notified: bool,
}

impl StreamEventDbModel {
    pub fn new(session_id: impl Into<String>, event_type: EventType, viewer_count: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            event_type: event_type.as_str().to_string(),
            viewer_count,
            detected_at: chrono::Utc::now().to_rfc3339(),
            summary: None,
            notified: false,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip() {
        assert_eq!(EventType::Topic.as_str(), "TOPIC");
        assert_eq!("HOT".parse::<EventType>().unwrap(), EventType::Hot);
    }

    #[test]
    fn test_new_event_not_notified() {
        let event = StreamEventDbModel::new("session-1", EventType::Start, 120);
        assert!(!event.notified);
        assert_eq!(event.event_type, "START");
    }
}
