//! Core traits and key layout for the caching system.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;

use super::freshness::FreshnessPolicy;
use crate::types::{Contact, Post, Video};

/// A cached resource class. Each class owns a data key and a timestamp key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
  Contacts,
  Posts,
  Videos,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 3] = [Self::Contacts, Self::Posts, Self::Videos];

  /// Key holding the serialized collection.
  pub fn data_key(&self) -> &'static str {
    match self {
      Self::Contacts => "contacts",
      Self::Posts => "cached_posts",
      Self::Videos => "cached_videos",
    }
  }

  /// Key holding the last successful fetch time (epoch millis).
  pub fn timestamp_key(&self) -> &'static str {
    match self {
      Self::Contacts => "contacts_last_fetch",
      Self::Posts => "posts_last_fetch",
      Self::Videos => "videos_last_fetch",
    }
  }

  pub fn default_policy(&self) -> FreshnessPolicy {
    match self {
      Self::Contacts => FreshnessPolicy::CONTACTS,
      Self::Posts => FreshnessPolicy::POSTS,
      Self::Videos => FreshnessPolicy::VIDEOS,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Contacts => "contacts",
      Self::Posts => "posts",
      Self::Videos => "videos",
    }
  }
}

/// Trait for records that can be cached.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Resource class this record is stored under
  const KIND: ResourceKind;

  /// Unique identifier within the collection (e.g., post id, contact email)
  fn cache_key(&self) -> String;
}

/// Keep the first record for each cache key, in order.
pub fn dedupe_by_key<T: Cacheable>(items: Vec<T>) -> Vec<T> {
  let mut seen = HashSet::new();
  items
    .into_iter()
    .filter(|item| seen.insert(item.cache_key()))
    .collect()
}

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Contact {
  const KIND: ResourceKind = ResourceKind::Contacts;

  // Emails are case-insensitive
  fn cache_key(&self) -> String {
    self.email.to_lowercase()
  }
}

impl Cacheable for Post {
  const KIND: ResourceKind = ResourceKind::Posts;

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

impl Cacheable for Video {
  const KIND: ResourceKind = ResourceKind::Videos;

  fn cache_key(&self) -> String {
    self.video_id.clone()
  }
}
