//! Audience matching: which Discord channels should hear about an event.

use std::collections::HashSet;
use std::sync::Arc;

use crate::Result;
use crate::database::models::{EventType, SubscriptionDbModel};
use crate::database::repositories::SubscriptionRepository;
use crate::notifier::LiveEvent;

/// Resolves an event to the set of receiver channels, applying keyword
/// filters and deduplicating channels subscribed both specifically and
/// globally.
pub struct SubscriptionMatcher {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionMatcher {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    pub async fn audience_for(&self, event: &LiveEvent) -> Result<Vec<String>> {
        let candidates = self
            .subscriptions
            .list_active_for(event.event_type(), event.channel_id())
            .await?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut receivers = Vec::new();
        for subscription in candidates {
            if !matches(&subscription, event) {
                continue;
            }
            if seen.insert(subscription.discord_channel_id.clone()) {
                receivers.push(subscription.discord_channel_id);
            }
        }
        Ok(receivers)
    }
}

/// Keyword filters apply to topic changes only; every other event type
/// matches any covering subscription.
fn matches(subscription: &SubscriptionDbModel, event: &LiveEvent) -> bool {
    if event.event_type() != EventType::Topic {
        return true;
    }
    let keywords = subscription.keyword_list();
    if keywords.is_empty() {
        return true;
    }
    let haystack = event.search_text();
    // Keywords are lowercased on write, but rows can also arrive from
    // other writers; lowercase again at comparison time.
    keywords
        .iter()
        .any(|keyword| haystack.contains(&keyword.to_lowercase()))
}
