//! Unified newest-first feed over the blog and video sources.

pub mod engine;
pub mod item;
pub mod session;

pub use engine::{FeedAdapter, FeedEngine, FeedSource, LaneReport, RoundReport};
pub use item::{parse_timestamp, FeedItem, FeedPayload};
pub use session::{FeedResource, FeedSession, FeedSnapshot, LoadMore};
