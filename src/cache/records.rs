//! Cache record manager: whole-collection snapshots with a fetch timestamp.

use chrono::Utc;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use super::freshness::FreshnessPolicy;
use super::traits::{Cacheable, ResourceKind};
use crate::error::CacheError;
use crate::store::KeyValueStore;

/// Typed cache for one resource class.
///
/// Reads never fail: a missing, unreadable or corrupt snapshot reads as an
/// empty collection and as stale. Writes replace the collection and stamp
/// the fetch time together.
pub struct ResourceCache<T: Cacheable> {
  store: Arc<dyn KeyValueStore>,
  policy: FreshnessPolicy,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Cacheable> ResourceCache<T> {
  /// Create a cache using the resource class's declared TTL.
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      store,
      policy: T::KIND.default_policy(),
      _marker: PhantomData,
    }
  }

  /// Override the TTL.
  pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn kind(&self) -> ResourceKind {
    T::KIND
  }

  pub fn policy(&self) -> FreshnessPolicy {
    self.policy
  }

  /// Read the cached collection, in stored order.
  pub async fn read_all(&self) -> Vec<T> {
    let key = T::KIND.data_key();
    let raw = match self.store.get(key).await {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!(resource = T::KIND.name(), error = %e, "Cache read failed, treating as empty");
        return Vec::new();
      }
    };

    match serde_json::from_str::<Vec<T>>(&raw) {
      Ok(items) => {
        debug!(resource = T::KIND.name(), count = items.len(), "Read cached collection");
        items
      }
      Err(e) => {
        warn!(
          resource = T::KIND.name(),
          key,
          error = %e,
          "Cached collection is corrupt, treating as empty"
        );
        Vec::new()
      }
    }
  }

  /// Time of the last successful write, in epoch millis.
  pub async fn last_fetched_at(&self) -> Option<i64> {
    let key = T::KIND.timestamp_key();
    match self.store.get(key).await {
      Ok(Some(raw)) => match raw.trim().parse::<i64>() {
        Ok(ts) => Some(ts),
        Err(e) => {
          warn!(resource = T::KIND.name(), key, error = %e, "Cache timestamp is corrupt");
          None
        }
      },
      Ok(None) => None,
      Err(e) => {
        warn!(resource = T::KIND.name(), error = %e, "Cache timestamp read failed");
        None
      }
    }
  }

  /// Whether the cached collection should be refetched now.
  pub async fn is_stale(&self) -> bool {
    self.is_stale_at(Utc::now().timestamp_millis()).await
  }

  /// Whether the cached collection should be refetched at `now`.
  pub async fn is_stale_at(&self, now: i64) -> bool {
    self.policy.is_stale(self.last_fetched_at().await, now)
  }

  /// Replace the cached collection and stamp it as fetched now.
  pub async fn write_all(&self, items: &[T]) -> Result<(), CacheError> {
    self.write_all_at(items, Utc::now().timestamp_millis()).await
  }

  /// Replace the cached collection and stamp it as fetched at `fetched_at`.
  pub async fn write_all_at(&self, items: &[T], fetched_at: i64) -> Result<(), CacheError> {
    let data_key = T::KIND.data_key();
    let data = serde_json::to_string(items).map_err(|e| CacheError::Serialize {
      key: data_key,
      reason: e.to_string(),
    })?;
    let stamp = fetched_at.to_string();

    self
      .store
      .multi_set(&[(data_key, &data), (T::KIND.timestamp_key(), &stamp)])
      .await
      .map_err(|source| CacheError::Write {
        key: data_key,
        source,
      })?;

    debug!(resource = T::KIND.name(), count = items.len(), "Cached collection replaced");
    Ok(())
  }

  /// Remove the data and timestamp keys of this resource class.
  pub async fn clear(&self) -> Result<(), CacheError> {
    self
      .store
      .multi_remove(&[T::KIND.data_key(), T::KIND.timestamp_key()])
      .await
      .map_err(CacheError::Clear)
  }
}

impl<T: Cacheable> Clone for ResourceCache<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      policy: self.policy,
      _marker: PhantomData,
    }
  }
}

/// Remove every resource class's keys at once.
pub async fn clear_all(store: &dyn KeyValueStore) -> Result<(), CacheError> {
  let keys: Vec<&str> = ResourceKind::ALL
    .iter()
    .flat_map(|kind| [kind.data_key(), kind.timestamp_key()])
    .collect();
  store.multi_remove(&keys).await.map_err(CacheError::Clear)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use crate::types::{Author, Contact, Post, Roles, Video};

  fn post(id: u64) -> Post {
    Post {
      id,
      title: format!("Post {}", id),
      excerpt: String::new(),
      date: "2024-01-01T00:00:00".to_string(),
      featured_image_url: None,
      link: format!("https://blog.test/?p={}", id),
      categories: Vec::new(),
      tags: Vec::new(),
      author: Author::unknown(),
    }
  }

  fn contact(email: &str) -> Contact {
    Contact {
      name: email.to_string(),
      email: email.to_string(),
      roles: Roles::default(),
      phone: None,
      student_id: None,
      batch: None,
      gender: None,
      blood_type: None,
      birthday: None,
      photo: None,
      linkedin: None,
      facebook: None,
    }
  }

  fn setup() -> (Arc<MemoryStore>, ResourceCache<Post>) {
    let store = Arc::new(MemoryStore::new());
    let cache = ResourceCache::new(store.clone() as Arc<dyn KeyValueStore>);
    (store, cache)
  }

  #[tokio::test]
  async fn test_round_trip_preserves_order() {
    let (_store, cache) = setup();
    let posts = vec![post(3), post(1), post(2)];

    cache.write_all(&posts).await.unwrap();
    assert_eq!(cache.read_all().await, posts);
  }

  #[tokio::test]
  async fn test_write_replaces_whole_collection() {
    let (_store, cache) = setup();
    cache.write_all(&[post(1), post(2)]).await.unwrap();
    cache.write_all(&[post(9)]).await.unwrap();
    assert_eq!(cache.read_all().await, vec![post(9)]);
  }

  #[tokio::test]
  async fn test_never_cached_is_empty_and_stale() {
    let (_store, cache) = setup();
    assert!(cache.read_all().await.is_empty());
    assert!(cache.is_stale().await);
  }

  #[tokio::test]
  async fn test_corrupt_data_reads_as_empty() {
    let (store, cache) = setup();
    store.set("cached_posts", "{not json").await.unwrap();
    assert!(cache.read_all().await.is_empty());
  }

  #[tokio::test]
  async fn test_corrupt_timestamp_is_stale() {
    let (store, cache) = setup();
    cache.write_all(&[post(1)]).await.unwrap();
    store.set("posts_last_fetch", "yesterday").await.unwrap();
    assert!(cache.is_stale().await);
  }

  #[tokio::test]
  async fn test_staleness_follows_policy() {
    let (_store, cache) = setup();
    let now = 1_700_000_000_000;
    cache
      .write_all_at(&[post(1)], now - 30 * 60 * 1000)
      .await
      .unwrap();
    assert!(!cache.is_stale_at(now).await);

    cache
      .write_all_at(&[post(1)], now - 2 * 60 * 60 * 1000)
      .await
      .unwrap();
    assert!(cache.is_stale_at(now).await);
  }

  #[tokio::test]
  async fn test_unreadable_store_degrades() {
    let (store, cache) = setup();
    cache.write_all(&[post(1)]).await.unwrap();
    store.set_fail_reads(true);

    assert!(cache.read_all().await.is_empty());
    assert!(cache.is_stale().await);
  }

  #[tokio::test]
  async fn test_write_failure_is_propagated() {
    let (store, cache) = setup();
    cache.write_all(&[post(1)]).await.unwrap();
    store.set_fail_writes(true);

    let err = cache.write_all(&[post(2)]).await.unwrap_err();
    assert!(matches!(err, CacheError::Write { key: "cached_posts", .. }));

    store.set_fail_writes(false);
    assert_eq!(cache.read_all().await, vec![post(1)]);
  }

  #[tokio::test]
  async fn test_clear_all_wipes_every_class() {
    let store = Arc::new(MemoryStore::new());
    let shared = store.clone() as Arc<dyn KeyValueStore>;
    let posts = ResourceCache::<Post>::new(shared.clone());
    let contacts = ResourceCache::<Contact>::new(shared.clone());
    let videos = ResourceCache::<Video>::new(shared.clone());

    posts.write_all(&[post(1)]).await.unwrap();
    contacts.write_all(&[contact("a@x.org")]).await.unwrap();
    store.set("token", "keep-me").await.unwrap();

    clear_all(shared.as_ref()).await.unwrap();

    assert!(posts.read_all().await.is_empty());
    assert!(contacts.read_all().await.is_empty());
    assert!(videos.read_all().await.is_empty());
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn test_clear_only_touches_own_keys() {
    let store = Arc::new(MemoryStore::new());
    let shared = store.clone() as Arc<dyn KeyValueStore>;
    let posts = ResourceCache::<Post>::new(shared.clone());
    let contacts = ResourceCache::<Contact>::new(shared);

    posts.write_all(&[post(1)]).await.unwrap();
    contacts.write_all(&[contact("a@x.org")]).await.unwrap();
    posts.clear().await.unwrap();

    assert!(posts.read_all().await.is_empty());
    assert_eq!(contacts.read_all().await.len(), 1);
  }
}
