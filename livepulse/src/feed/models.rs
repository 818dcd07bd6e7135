//! Wire models for the listing feed API.

use serde::{Deserialize, Serialize};

/// One live broadcast entry as returned by the listing feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveItem {
    pub channel_id: String,
    pub channel_name: String,
    pub live_title: String,
    pub live_category: Option<String>,
    /// Human-readable category label; the category field is a slug.
    pub live_category_value: Option<String>,
    pub tags: Vec<String>,
    pub concurrent_user_count: i64,
    pub open_date: String,
    pub live_thumbnail_image_url: Option<String>,
    pub adult: bool,
}

impl LiveItem {
    /// Display category, preferring the label over the slug.
    pub fn category(&self) -> &str {
        self.live_category_value
            .as_deref()
            .or(self.live_category.as_deref())
            .unwrap_or("")
    }
}

/// One fetched page: its items plus the cursor to the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub items: Vec<LiveItem>,
    pub next: Option<String>,
}

/// Top-level response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub content: Option<FeedContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedContent {
    #[serde(default)]
    pub data: Vec<LiveItem>,
    #[serde(default)]
    pub page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    #[serde(default)]
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_deserialization() {
        let raw = r#"{
            "code": 200,
            "message": null,
            "content": {
                "data": [{
                    "channelId": "abc",
                    "channelName": "Streamer",
                    "liveTitle": "Hello",
                    "liveCategory": "talk",
                    "liveCategoryValue": "Just Chatting",
                    "tags": ["chat"],
                    "concurrentUserCount": 321,
                    "openDate": "2026-01-01 12:00:00",
                    "adult": false
                }],
                "page": {"next": "cursor-1"}
            }
        }"#;
        let envelope: ApiEnvelope = serde_json::from_str(raw).unwrap();
        let content = envelope.content.unwrap();
        assert_eq!(content.data.len(), 1);
        assert_eq!(content.data[0].concurrent_user_count, 321);
        assert_eq!(content.data[0].category(), "Just Chatting");
        assert_eq!(content.page.unwrap().next.as_deref(), Some("cursor-1"));
    }

    #[test]
    fn test_missing_optional_fields() {
        let raw = r#"{"channelId": "abc", "channelName": "x", "liveTitle": "t",
                      "concurrentUserCount": 5, "openDate": ""}"#;
        let item: LiveItem = serde_json::from_str(raw).unwrap();
        assert!(item.tags.is_empty());
        assert_eq!(item.category(), "");
    }
}
