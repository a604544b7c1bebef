//! Transient operator notices shown in the footer.

use chrono::{DateTime, Duration, Utc};

/// How long a notice stays visible
pub fn notice_lifetime() -> Duration {
  Duration::seconds(5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
  Info,
  Success,
  Warning,
  Error,
}

/// Follow-up the operator can trigger from a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
  Retry,
  Dismiss,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub level: NotificationLevel,
  pub message: String,
  pub action: Option<NotificationAction>,
  pub created_at: DateTime<Utc>,
}

impl Notification {
  pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
    Self {
      level,
      message: message.into(),
      action: None,
      created_at: Utc::now(),
    }
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self::new(NotificationLevel::Info, message)
  }

  pub fn success(message: impl Into<String>) -> Self {
    Self::new(NotificationLevel::Success, message)
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self::new(NotificationLevel::Warning, message)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(NotificationLevel::Error, message)
  }

  pub fn with_action(mut self, action: NotificationAction) -> Self {
    self.action = Some(action);
    self
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now - self.created_at >= notice_lifetime()
  }
}

/// Queue of visible notices, newest last.
#[derive(Debug, Default)]
pub struct NotificationCenter {
  items: Vec<Notification>,
}

impl NotificationCenter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, notification: Notification) {
    self.items.push(notification);
  }

  /// Drop expired notices, returning whether anything changed
  pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
    let before = self.items.len();
    self.items.retain(|n| !n.is_expired(now));
    before != self.items.len()
  }

  /// Dismiss the newest notice
  pub fn dismiss(&mut self) -> Option<Notification> {
    self.items.pop()
  }

  pub fn latest(&self) -> Option<&Notification> {
    self.items.last()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_expires_after_lifetime() {
    let notice = Notification::success("License generated");
    let at = notice.created_at;
    assert!(!notice.is_expired(at + Duration::seconds(4)));
    assert!(notice.is_expired(at + Duration::seconds(5)));
  }

  #[test]
  fn test_prune_keeps_recent() {
    let mut center = NotificationCenter::new();
    let mut old = Notification::info("old");
    old.created_at = Utc::now() - Duration::seconds(10);
    center.push(old);
    center.push(Notification::error("fresh"));

    assert!(center.prune(Utc::now()));
    assert_eq!(center.len(), 1);
    assert_eq!(center.latest().unwrap().message, "fresh");
    assert!(!center.prune(Utc::now()));
  }

  #[test]
  fn test_dismiss_newest() {
    let mut center = NotificationCenter::new();
    center.push(Notification::info("first"));
    center.push(Notification::warning("second").with_action(NotificationAction::Retry));

    let dismissed = center.dismiss().unwrap();
    assert_eq!(dismissed.message, "second");
    assert_eq!(dismissed.action, Some(NotificationAction::Retry));
    assert_eq!(center.latest().unwrap().message, "first");
  }
}
