//! SQLite-backed key-value store.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::StoreError;

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Key-value store persisted in a single SQLite table.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cdir").join("cache.db"))
  }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    let value = conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(value)
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(())
  }

  async fn multi_remove(&self, keys: &[&str]) -> Result<(), StoreError> {
    let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    let tx = conn.transaction()?;
    for key in keys {
      tx.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    }
    tx.commit()?;
    Ok(())
  }

  async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
    let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    let tx = conn.transaction()?;
    for (key, value) in entries {
      tx.execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )?;
    }
    tx.commit()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store
        .multi_set(&[("cached_posts", "[]"), ("posts_last_fetch", "42")])
        .await
        .unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(store.get("cached_posts").await.unwrap().as_deref(), Some("[]"));
    assert_eq!(
      store.get("posts_last_fetch").await.unwrap().as_deref(),
      Some("42")
    );
  }

  #[tokio::test]
  async fn test_set_replaces_and_multi_remove_deletes() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("contacts", "a").await.unwrap();
    store.set("contacts", "b").await.unwrap();
    store.set("contacts_last_fetch", "1").await.unwrap();
    assert_eq!(store.get("contacts").await.unwrap().as_deref(), Some("b"));

    store
      .multi_remove(&["contacts", "contacts_last_fetch", "never_written"])
      .await
      .unwrap();
    assert_eq!(store.get("contacts").await.unwrap(), None);
    assert_eq!(store.get("contacts_last_fetch").await.unwrap(), None);
  }
}
