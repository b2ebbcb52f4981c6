//! Offline-first community directory: cached blog posts, videos and member
//! contacts with stale-while-revalidate refresh and a merged newest-first feed.

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod directory;
pub mod error;
pub mod feed;
pub mod query;
pub mod resource;
pub mod sources;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;
