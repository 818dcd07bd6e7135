//! Canonical content snapshot used to detect topic changes.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::feed::LiveItem;

/// The notified content of a broadcast: title, category, tags.
///
/// Serialized with a fixed field order and sorted tags so two snapshots of
/// the same content always produce the same JSON string; tag order in the
/// feed is not significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSnapshot {
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl BroadcastSnapshot {
    pub fn from_item(item: &LiveItem) -> Self {
        let mut tags = item.tags.clone();
        tags.sort();
        Self {
            title: item.live_title.clone(),
            category: item.category().to_string(),
            tags,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
