//! Durable client-side state in a namespaced SQLite key/value table.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Namespace prepended to every key
pub const DEFAULT_PREFIX: &str = "licdeck_";

/// Well-known keys
pub mod keys {
  pub const LAST_TAB: &str = "last_tab";
  pub const HARDWARE_INFO: &str = "hardware_info";
  pub const VALIDATION_HISTORY: &str = "validation_history";
  pub const FIRST_VISIT: &str = "first_visit";
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Prefix-scoped JSON key/value store.
pub struct KvStore {
  conn: Mutex<Connection>,
  prefix: String,
}

impl KvStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create state directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open state database at {}: {}", path.display(), e))?;

    Self::from_connection(conn, DEFAULT_PREFIX)
  }

  /// Store that lives only as long as the process
  pub fn in_memory() -> Result<Self> {
    Self::in_memory_with_prefix(DEFAULT_PREFIX)
  }

  pub fn in_memory_with_prefix(prefix: &str) -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory state: {}", e))?;
    Self::from_connection(conn, prefix)
  }

  fn from_connection(conn: Connection, prefix: &str) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run state migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
      prefix: prefix.to_string(),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("licdeck").join("state.db"))
  }

  fn conn(&self) -> MutexGuard<'_, Connection> {
    self.conn.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn scoped(&self, key: &str) -> String {
    format!("{}{}", self.prefix, key)
  }

  /// Read a value. Undecodable values read as absent.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let scoped = self.scoped(key);
    let raw: Option<String> = self
      .conn()
      .query_row("SELECT value FROM kv WHERE key = ?1", params![scoped], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", scoped, e))?;

    Ok(raw.and_then(|raw| match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key = %scoped, error = %e, "ignoring undecodable stored value");
        None
      }
    }))
  }

  pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
    let scoped = self.scoped(key);
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to encode {}: {}", scoped, e))?;

    self
      .conn()
      .execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![scoped, raw],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", scoped, e))?;

    Ok(())
  }

  pub fn remove(&self, key: &str) -> Result<()> {
    let scoped = self.scoped(key);
    self
      .conn()
      .execute("DELETE FROM kv WHERE key = ?1", params![scoped])
      .map_err(|e| eyre!("Failed to remove {}: {}", scoped, e))?;
    Ok(())
  }

  /// Remove every key in this store's namespace, leaving other namespaces alone.
  pub fn clear(&self) -> Result<usize> {
    self
      .conn()
      .execute(
        "DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1",
        params![self.prefix],
      )
      .map_err(|e| eyre!("Failed to clear state: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_get_round_trip() {
    let store = KvStore::in_memory().unwrap();
    store.set(keys::LAST_TAB, "validate").unwrap();
    assert_eq!(
      store.get::<String>(keys::LAST_TAB).unwrap(),
      Some("validate".to_string())
    );
  }

  #[test]
  fn test_missing_key_is_none() {
    let store = KvStore::in_memory().unwrap();
    assert_eq!(store.get::<String>("nothing").unwrap(), None);
  }

  #[test]
  fn test_overwrite() {
    let store = KvStore::in_memory().unwrap();
    store.set("count", &1).unwrap();
    store.set("count", &2).unwrap();
    assert_eq!(store.get::<i32>("count").unwrap(), Some(2));
  }

  #[test]
  fn test_wrong_type_reads_as_none() {
    let store = KvStore::in_memory().unwrap();
    store.set("flag", "not a bool").unwrap();
    assert_eq!(store.get::<bool>("flag").unwrap(), None);
  }

  #[test]
  fn test_remove() {
    let store = KvStore::in_memory().unwrap();
    store.set(keys::FIRST_VISIT, &false).unwrap();
    store.remove(keys::FIRST_VISIT).unwrap();
    assert_eq!(store.get::<bool>(keys::FIRST_VISIT).unwrap(), None);
  }

  #[test]
  fn test_keys_are_prefixed() {
    let store = KvStore::in_memory().unwrap();
    store.set(keys::LAST_TAB, "admin").unwrap();

    let stored: String = store
      .conn()
      .query_row("SELECT key FROM kv", [], |row| row.get(0))
      .unwrap();
    assert_eq!(stored, "licdeck_last_tab");
  }

  #[test]
  fn test_clear_only_touches_namespace() {
    let store = KvStore::in_memory().unwrap();
    store
      .conn()
      .execute(
        "INSERT INTO kv (key, value) VALUES ('other_app_key', '1'), ('licdeckXlast', '2')",
        [],
      )
      .unwrap();
    store.set(keys::LAST_TAB, "admin").unwrap();
    store.set(keys::FIRST_VISIT, &false).unwrap();

    assert_eq!(store.clear().unwrap(), 2);

    let remaining: i64 = store
      .conn()
      .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
      .unwrap();
    assert_eq!(remaining, 2);
  }

  #[test]
  fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");

    KvStore::open_at(&path)
      .unwrap()
      .set(keys::LAST_TAB, "control")
      .unwrap();
    let reopened = KvStore::open_at(&path).unwrap();

    assert_eq!(
      reopened.get::<String>(keys::LAST_TAB).unwrap(),
      Some("control".to_string())
    );
  }
}
