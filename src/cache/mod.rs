//! Typed, timestamped caching over the persistent key-value store.
//!
//! This module provides:
//! - A per-resource-class freshness policy (one declared TTL per class)
//! - A record manager that reads, replaces and expires whole collections
//! - Degradation rules: unreadable or corrupt caches read as empty and stale

mod freshness;
mod records;
mod traits;

pub use freshness::{is_stale, FreshnessPolicy};
pub use records::{clear_all, ResourceCache};
pub use traits::{dedupe_by_key, Cacheable, ResourceKind};
