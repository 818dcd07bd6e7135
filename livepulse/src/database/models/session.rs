//! Session and metrics database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single, continuous live broadcast from detected start to detected end.
///
/// Invariant: at most one open session (ended_at null) per streamer at any time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StreamSessionDbModel {
    pub id: String,
    pub streamer_id: String,
    pub title: String,
    pub category: String,
    /// ISO 8601 timestamp when the broadcast began.
    pub started_at: String,
    /// ISO 8601 timestamp when the broadcast ended (null if ongoing).
    pub ended_at: Option<String>,
    pub average_viewer_count: i64,
    pub peak_viewer_count: i64,
}

impl StreamSessionDbModel {
    pub fn new(
        streamer_id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        started_at: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            streamer_id: streamer_id.into(),
            title: title.into(),
            category: category.into(),
            started_at: started_at.into(),
            ended_at: None,
            average_viewer_count: 0,
            peak_viewer_count: 0,
        }
    }
}

/// One observation of a continuing broadcast, appended every fast cycle.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StreamMetricsDbModel {
    pub id: String,
    pub session_id: String,
    pub viewer_count: i64,
    pub title: String,
    pub category: String,
    /// JSON array of tag strings.
    pub tags: String,
    pub created_at: String,
}

impl StreamMetricsDbModel {
    pub fn new(
        session_id: impl Into<String>,
        viewer_count: i64,
        title: impl Into<String>,
        category: impl Into<String>,
        tags: &[String],
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            viewer_count,
            title: title.into(),
            category: category.into(),
            tags: serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string()),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_open() {
        let session = StreamSessionDbModel::new("streamer-1", "Title", "Games", "2026-01-01T00:00:00Z");
        assert!(session.ended_at.is_none());
        assert_eq!(session.peak_viewer_count, 0);
    }

    #[test]
    fn test_metrics_tags_json() {
        let metrics =
            StreamMetricsDbModel::new("session-1", 42, "Title", "Games", &["rpg".to_string()]);
        assert_eq!(metrics.tags, r#"["rpg"]"#);
    }
}
