//! Outbound delivery: webhook sending plus the audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::AppConfig;
use crate::database::models::NotificationDbModel;
use crate::database::repositories::{EventRepository, NotificationRepository};
use crate::notifier::{LiveEvent, SubscriptionMatcher};
use crate::{Error, Result};

/// Delivers one rendered message to one receiver channel.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, receiver_id: &str, message: &str) -> Result<()>;
}

/// Discord-compatible webhook sender posting `{"content": ...}`.
pub struct DiscordWebhookSender {
    http: reqwest::Client,
    webhook_url: String,
}

impl DiscordWebhookSender {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            webhook_url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl WebhookSender for DiscordWebhookSender {
    async fn send(&self, _receiver_id: &str, message: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "content": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::feed(format!(
                "webhook delivery failed with status {status}"
            )));
        }
        Ok(())
    }
}

/// Dispatches one event to its audience and records every delivery attempt.
///
/// A failed delivery is recorded and not retried; the event is marked
/// notified as soon as at least one receiver got the message.
pub struct NotificationService {
    matcher: SubscriptionMatcher,
    sender: Arc<dyn WebhookSender>,
    notifications: Arc<dyn NotificationRepository>,
    events: Arc<dyn EventRepository>,
    watch_url_base: String,
}

impl NotificationService {
    pub fn new(
        matcher: SubscriptionMatcher,
        sender: Arc<dyn WebhookSender>,
        notifications: Arc<dyn NotificationRepository>,
        events: Arc<dyn EventRepository>,
        watch_url_base: impl Into<String>,
    ) -> Self {
        Self {
            matcher,
            sender,
            notifications,
            events,
            watch_url_base: watch_url_base.into(),
        }
    }

    pub async fn dispatch(&self, event_row_id: &str, event: &LiveEvent) -> Result<()> {
        let receivers = self.matcher.audience_for(event).await?;
        if receivers.is_empty() {
            tracing::debug!(
                channel_id = event.channel_id(),
                event_type = %event.event_type(),
                "no audience for event"
            );
            return Ok(());
        }

        let event_type = event.event_type().as_str();
        let message = event.render_message(&self.watch_url_base);
        let mut any_delivered = false;

        for receiver in receivers {
            let record = match self.sender.send(&receiver, &message).await {
                Ok(()) => {
                    any_delivered = true;
                    NotificationDbModel::delivered(event_type, &receiver, &message)
                }
                Err(e) => {
                    tracing::warn!(
                        receiver = %receiver,
                        error = %e,
                        "notification delivery failed"
                    );
                    NotificationDbModel::failed(event_type, &receiver, &message, e.to_string())
                }
            };
            self.notifications.record(&record).await?;
        }

        if any_delivered {
            self.events.mark_notified(event_row_id).await?;
        }
        Ok(())
    }
}
