//! Database models.

mod event;
mod notification;
mod session;
mod streamer;
mod subscription;

pub use event::{EventType, StreamEventDbModel};
pub use notification::NotificationDbModel;
pub use session::{StreamMetricsDbModel, StreamSessionDbModel};
pub use streamer::StreamerDbModel;
pub use subscription::SubscriptionDbModel;
