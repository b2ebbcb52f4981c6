//! Persistent string-keyed storage shared by every cache.
//!
//! All cached payloads are serialized JSON text. Each resource class owns a
//! distinct key pair, so implementations need no cross-key locking.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Trait for key-value storage backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Get the value stored under `key`.
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

  /// Store `value` under `key`, replacing any previous value.
  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

  /// Remove `key`. Missing keys are not an error.
  async fn remove(&self, key: &str) -> Result<(), StoreError>;

  /// Remove every key in `keys`.
  async fn multi_remove(&self, keys: &[&str]) -> Result<(), StoreError>;

  /// Store several entries.
  ///
  /// The default runs sequential `set` calls and stops at the first failure.
  /// Backends with transactions override this to make the write atomic.
  async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
    for (key, value) in entries {
      self.set(key, value).await?;
    }
    Ok(())
  }
}
