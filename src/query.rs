//! Background fetches polled from the UI tick.
//!
//! A `Query<T>` owns a fetcher closure. `fetch()` spawns it on the runtime and
//! `poll()` picks up the result without blocking, so views stay responsive
//! while requests and their retries are in flight.
//!
//! ```ignore
//! let api = ctx.api.clone();
//! let mut licenses = Query::new(move || {
//!   let api = api.clone();
//!   async move { api.licenses().await.map_err(|e| e.to_string()) }
//! });
//! licenses.fetch();
//!
//! // on tick
//! if licenses.poll() {
//!   // redraw
//! }
//! ```
//!
//! Replacing a pending fetch drops its receiver, so a late answer for a
//! superseded or unmounted view is discarded instead of being applied.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  Idle,
  Loading,
  Success(T),
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<oneshot::Receiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
}

impl<T: Send + 'static> Query<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn data_mut(&mut self) -> Option<&mut T> {
    match &mut self.state {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// A fetch is in flight, including background refreshes
  pub fn is_loading(&self) -> bool {
    self.receiver.is_some()
  }

  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }

  /// Start a fetch unless one is already running.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    self.state = QueryState::Loading;
    self.spawn();
  }

  /// Discard any pending fetch and start over from the loading state.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.state = QueryState::Loading;
    self.spawn();
  }

  /// Fetch again while still showing the current data.
  ///
  /// Used by auto-refresh. If the refresh fails the data is replaced by the
  /// error, never left on screen as if it were current.
  pub fn refresh(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    if self.state.data().is_none() {
      self.state = QueryState::Loading;
    }
    self.spawn();
  }

  /// Drop any pending fetch and start a new one, keeping the current data.
  ///
  /// For after a mutation: a fetch started earlier may carry the old state.
  pub fn reload(&mut self) {
    self.receiver = None;
    if self.state.data().is_none() {
      self.state = QueryState::Loading;
    }
    self.spawn();
  }

  /// Apply a finished fetch. Returns true when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.receiver.as_mut() else {
      return false;
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
      }
      Ok(Err(error)) => self.state = QueryState::Error(error),
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = QueryState::Error("Request was cancelled".to_string());
      }
    }
    self.receiver = None;
    true
  }

  fn spawn(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .finish_non_exhaustive()
  }
}

/// A single spawned request whose result is picked up by polling.
///
/// Used for mutations, which run once per operator action.
pub struct Pending<T> {
  receiver: oneshot::Receiver<Result<T, String>>,
}

impl<T: Send + 'static> Pending<T> {
  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let (tx, receiver) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    Self { receiver }
  }

  /// `Some` once the request has finished
  pub fn poll(&mut self) -> Option<Result<T, String>> {
    match self.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(Err("Request was cancelled".to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  #[tokio::test]
  async fn test_fetch_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });
    assert_eq!(query.state(), &QueryState::Idle);

    query.fetch();
    assert!(query.is_loading());
    settle().await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
    assert!(!query.is_loading());
    assert!(query.fetched_at().is_some());
  }

  #[tokio::test]
  async fn test_fetch_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("503: maintenance".to_string()) });
    query.fetch();
    settle().await;

    assert!(query.poll());
    assert_eq!(query.error(), Some("503: maintenance"));
  }

  #[tokio::test]
  async fn test_poll_without_fetch_is_noop() {
    let mut query = Query::new(|| async { Ok::<_, String>(1) });
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_refresh_keeps_data_until_answer() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
          Ok(n)
        } else {
          tokio::time::sleep(Duration::from_millis(30)).await;
          Err("timeout".to_string())
        }
      }
    });

    query.fetch();
    settle().await;
    query.poll();

    query.refresh();
    assert_eq!(query.data(), Some(&0));
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(query.poll());
    assert_eq!(query.data(), None);
    assert_eq!(query.error(), Some("timeout"));
  }

  #[tokio::test]
  async fn test_refetch_discards_pending() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    query.fetch();
    settle().await;
    query.refetch();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_reload_drops_older_refresh() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n == 1 {
          tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok::<_, String>(n)
      }
    });

    query.fetch();
    settle().await;
    query.poll();

    query.refresh();
    query.reload();
    assert_eq!(query.data(), Some(&0));
    settle().await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&2));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!query.poll());
    assert_eq!(query.data(), Some(&2));
  }

  #[tokio::test]
  async fn test_pending_resolves_once() {
    let mut pending = Pending::spawn(async { Ok::<_, String>("done") });
    settle().await;
    assert_eq!(pending.poll(), Some(Ok("done")));
  }
}
