//! In-memory key/value store with per-entry expiry.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// A cached value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub expires_at_ms: i64,
}

impl<V> CacheEntry<V> {
  fn is_expired(&self, now_ms: i64) -> bool {
    now_ms >= self.expires_at_ms
  }
}

/// Thread-safe TTL cache.
///
/// Expired entries are dropped lazily by [`get`](Self::get) and eagerly by
/// [`sweep_expired`](Self::sweep_expired). There is no capacity bound. The
/// lock is never held across an await point.
pub struct TtlCache<V> {
  entries: Mutex<HashMap<String, CacheEntry<V>>>,
  clock: Arc<dyn Clock>,
}

impl<V: Clone> Default for TtlCache<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: Clone> TtlCache<V> {
  pub fn new() -> Self {
    Self::with_clock(Arc::new(SystemClock))
  }

  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      clock,
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
    // A panic mid-insert cannot leave the map itself inconsistent
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn set(&self, key: &str, value: V, ttl: Duration) {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let entry = CacheEntry {
      value,
      expires_at_ms: self.clock.now_ms().saturating_add(ttl_ms),
    };
    self.entries().insert(key.to_string(), entry);
  }

  /// Fresh value for `key`, evicting it if it has expired.
  pub fn get(&self, key: &str) -> Option<V> {
    let now = self.clock.now_ms();
    let mut entries = self.entries();
    match entries.get(key) {
      Some(entry) if entry.is_expired(now) => {
        entries.remove(key);
        None
      }
      Some(entry) => Some(entry.value.clone()),
      None => None,
    }
  }

  pub fn delete(&self, key: &str) -> bool {
    self.entries().remove(key).is_some()
  }

  pub fn clear(&self) {
    self.entries().clear();
  }

  /// Remove every expired entry, returning how many were dropped.
  pub fn sweep_expired(&self) -> usize {
    let now = self.clock.now_ms();
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
  }

  /// Number of stored entries, expired or not
  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
pub(crate) mod test_clock {
  use super::Clock;
  use std::sync::atomic::{AtomicI64, Ordering};

  /// Clock that only moves when told to
  #[derive(Debug, Default)]
  pub struct ManualClock(AtomicI64);

  impl ManualClock {
    pub fn at(ms: i64) -> Self {
      Self(AtomicI64::new(ms))
    }

    pub fn advance_ms(&self, ms: i64) {
      self.0.fetch_add(ms, Ordering::SeqCst);
    }
  }

  impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
      self.0.load(Ordering::SeqCst)
    }
  }
}
