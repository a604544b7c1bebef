use crate::nav::TabId;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard hint for the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // lower first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What the app should do after a view handled a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  None,
  /// Switch to another tab
  Navigate(TabId),
  /// Key was not used by the view
  Unhandled,
}

/// One tab's screen.
///
/// A view is built fresh each time its tab is shown. `init` starts its data
/// loads, which run in the background and are picked up in `tick`.
/// `deactivate` is called before the next tab's `init` and must stop any
/// timers the view started.
pub trait TabView {
  fn tab(&self) -> TabId;

  fn init(&mut self) -> Result<()>;

  fn deactivate(&mut self) {}

  /// Auto-refresh or operator-requested reload
  fn refresh(&mut self) {}

  fn tick(&mut self) {}

  fn is_loading(&self) -> bool {
    false
  }

  /// An input, picker or dialog owns the keyboard
  fn is_capturing_input(&self) -> bool {
    false
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn shortcuts(&self) -> Vec<ShortcutInfo>;
}
