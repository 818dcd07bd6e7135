//! Repository traits and sqlx implementations.

mod event;
mod notification;
mod session;
mod streamer;
mod subscription;

pub use event::{EventRepository, SqlxEventRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use streamer::{SqlxStreamerRepository, StreamerRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
