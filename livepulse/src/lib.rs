//! livepulse library crate.
//!
//! Tracks which broadcasts are live on a cursor-paginated listing feed and
//! derives lifecycle events (start, end, topic change, hot spike) per broadcast
//! to drive subscription-based notification fan-out.

pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod notifier;
pub mod scheduler;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
