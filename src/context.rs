use crate::config::Config;
use crate::event::{Event, EventSender};
use crate::license::LicenseApi;
use crate::notifications::Notification;
use crate::storage::KvStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared state handed to every view when it is built.
#[derive(Clone)]
pub struct AppContext {
  pub api: Arc<dyn LicenseApi>,
  pub store: Arc<KvStore>,
  pub config: Arc<Config>,
  pub events: EventSender,
  /// When the console started, for the dashboard's uptime
  pub started_at: DateTime<Utc>,
}

impl AppContext {
  pub fn new(
    api: Arc<dyn LicenseApi>,
    store: Arc<KvStore>,
    config: Arc<Config>,
    events: EventSender,
  ) -> Self {
    Self {
      api,
      store,
      config,
      events,
      started_at: Utc::now(),
    }
  }

  pub fn notify(&self, notification: Notification) {
    let _ = self.events.send(Event::Notify(notification));
  }
}
