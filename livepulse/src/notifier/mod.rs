//! Notification pipeline: event rendering, audience matching, dispatch.

pub mod dispatcher;
pub mod events;
pub mod matcher;

pub use dispatcher::{DiscordWebhookSender, NotificationService, WebhookSender};
pub use events::LiveEvent;
pub use matcher::SubscriptionMatcher;
