//! Durable scan state: entry cursors and the known-live set.

pub mod cursor;
pub mod live_state;

pub use cursor::{CursorStore, SqlxCursorStore};
pub use live_state::{LiveStateStore, SqlxLiveStateStore};
