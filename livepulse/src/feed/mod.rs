//! Listing feed access: wire models, HTTP client, and cursor discovery.

pub mod client;
pub mod models;
pub mod walker;

pub use client::{HttpListingClient, ListingClient};
pub use models::{FeedPage, LiveItem};
pub use walker::CursorWalker;
