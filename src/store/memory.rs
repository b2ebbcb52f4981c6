//! In-memory store used by tests and as a throwaway backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::StoreError;

/// Store implementation backed by a `HashMap`.
///
/// Reads and writes can be switched to fail, to exercise degraded paths.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
  fail_reads: AtomicBool,
  fail_writes: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every subsequent read fail.
  pub fn set_fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }

  /// Make every subsequent write or removal fail.
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Number of stored keys.
  pub fn len(&self) -> usize {
    self.entries.lock().map(|m| m.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn check_read(&self) -> Result<(), StoreError> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("reads disabled".to_string()));
    }
    Ok(())
  }

  fn check_write(&self) -> Result<(), StoreError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("writes disabled".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    self.check_read()?;
    let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(entries.get(key).cloned())
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    self.check_write()?;
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.check_write()?;
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    entries.remove(key);
    Ok(())
  }

  async fn multi_remove(&self, keys: &[&str]) -> Result<(), StoreError> {
    self.check_write()?;
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    for key in keys {
      entries.remove(*key);
    }
    Ok(())
  }

  async fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<(), StoreError> {
    self.check_write()?;
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    for (key, value) in pairs {
      entries.insert(key.to_string(), value.to_string());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_set_get_remove() {
    let store = MemoryStore::new();
    store.set("a", "1").await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

    store.remove("a").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_failing_writes_leave_state_untouched() {
    let store = MemoryStore::new();
    store.set("a", "1").await.unwrap();
    store.set_fail_writes(true);

    assert!(store.multi_set(&[("a", "2"), ("b", "3")]).await.is_err());
    store.set_fail_writes(false);
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    assert_eq!(store.get("b").await.unwrap(), None);
  }
}
