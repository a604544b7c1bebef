use super::ttl::TtlCache;
use crate::api::ApiError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Read-through access to a [`TtlCache`].
///
/// Concurrent misses on the same key each run their own fetch; the last
/// writer wins. Fetches are idempotent reads so this only costs a request.
pub struct CachedAccessor<V> {
  cache: Arc<TtlCache<V>>,
}

impl<V> Clone for CachedAccessor<V> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
    }
  }
}

impl<V: Clone> CachedAccessor<V> {
  pub fn new(cache: Arc<TtlCache<V>>) -> Self {
    Self { cache }
  }

  pub fn cache(&self) -> &Arc<TtlCache<V>> {
    &self.cache
  }

  /// Return the fresh cached value for `key`, or run `fetch` and cache its
  /// result for `ttl`. Failed fetches leave the cache untouched.
  pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F, ttl: Duration) -> Result<V, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, ApiError>>,
  {
    if let Some(value) = self.cache.get(key) {
      debug!(key, "cache hit");
      return Ok(value);
    }

    debug!(key, "cache miss");
    let value = fetch().await?;
    self.cache.set(key, value.clone(), ttl);
    Ok(value)
  }

  pub fn invalidate(&self, key: &str) {
    if self.cache.delete(key) {
      debug!(key, "cache entry invalidated");
    }
  }
}
