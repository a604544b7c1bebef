//! Tabs and the router that switches between them.

use crate::event::{Event, EventSender};
use crate::ui::view::{TabView, ViewAction};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabId {
  Dashboard,
  Generate,
  Validate,
  Admin,
  Control,
}

/// Tab shown when nothing usable was persisted
pub const HOME_TAB: TabId = TabId::Dashboard;

impl TabId {
  pub fn all() -> &'static [TabId] {
    &[
      TabId::Dashboard,
      TabId::Generate,
      TabId::Validate,
      TabId::Admin,
      TabId::Control,
    ]
  }

  /// Identifier used in storage, commands and `--tab`
  pub fn as_str(&self) -> &'static str {
    match self {
      TabId::Dashboard => "dashboard",
      TabId::Generate => "generate",
      TabId::Validate => "validate",
      TabId::Admin => "admin",
      TabId::Control => "control",
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      TabId::Dashboard => "Dashboard",
      TabId::Generate => "Generate",
      TabId::Validate => "Validate",
      TabId::Admin => "Admin",
      TabId::Control => "Control Panel",
    }
  }

  pub fn parse(id: &str) -> Option<TabId> {
    let id = id.trim();
    Self::all().iter().copied().find(|t| t.as_str() == id)
  }

  pub fn index(&self) -> usize {
    Self::all().iter().position(|t| t == self).unwrap_or(0)
  }

  /// Number key that selects this tab
  pub fn hotkey(&self) -> char {
    char::from(b'1' + self.index() as u8)
  }

  pub fn from_hotkey(c: char) -> Option<TabId> {
    let idx = c.to_digit(10)?.checked_sub(1)?;
    Self::all().get(idx as usize).copied()
  }

  pub fn next(&self) -> TabId {
    let all = Self::all();
    all[(self.index() + 1) % all.len()]
  }

  pub fn previous(&self) -> TabId {
    let all = Self::all();
    let idx = self.index();
    all[if idx == 0 { all.len() - 1 } else { idx - 1 }]
  }
}

impl std::fmt::Display for TabId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Tab to start on given the persisted identifier
pub fn resolve_initial(stored: Option<&str>) -> TabId {
  stored.and_then(TabId::parse).unwrap_or(HOME_TAB)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabTransition {
  pub from: TabId,
  pub to: TabId,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabState {
  pub active: TabId,
  pub previous: Option<TabId>,
}

/// Builds the view for a tab, fresh on every switch
pub type ViewFactory = Box<dyn FnMut(TabId) -> Box<dyn TabView>>;

/// Owns the active tab's view and performs tab switches.
///
/// A switch deactivates the current view (stopping its timers), mounts a
/// freshly built view for the target and initializes it. The loading flag is
/// cleared whether or not initialization succeeds.
pub struct Router {
  state: TabState,
  view: Option<Box<dyn TabView>>,
  factory: ViewFactory,
  events: EventSender,
  loading: bool,
}

impl Router {
  pub fn new(initial: TabId, factory: ViewFactory, events: EventSender) -> Self {
    Self {
      state: TabState {
        active: initial,
        previous: None,
      },
      view: None,
      factory,
      events,
      loading: false,
    }
  }

  /// Mount the initial tab. No transition is emitted.
  pub fn open(&mut self) -> Result<()> {
    let tab = self.state.active;
    self.loading = true;
    let mut view = (self.factory)(tab);
    let result = view.init();
    self.view = Some(view);
    self.loading = false;
    info!(tab = %tab, "opened tab");
    result
  }

  /// Switch by identifier. Unknown identifiers are ignored.
  pub fn show_tab(&mut self, id: &str) -> Result<bool> {
    match TabId::parse(id) {
      Some(tab) => self.show(tab),
      None => {
        debug!(id, "ignoring unknown tab");
        Ok(false)
      }
    }
  }

  /// Switch to `target`. Returns whether a switch happened.
  pub fn show(&mut self, target: TabId) -> Result<bool> {
    if self.view.is_some() && target == self.state.active {
      return Ok(false);
    }

    self.loading = true;
    let from = self.state.active;

    if let Some(mut current) = self.view.take() {
      current.deactivate();
    }

    let mut next = (self.factory)(target);
    let init = next.init();
    self.view = Some(next);
    self.state = TabState {
      active: target,
      previous: Some(from),
    };

    let outcome = match init {
      Ok(()) => {
        info!(from = %from, to = %target, "switched tab");
        let _ = self.events.send(Event::TabChanged(TabTransition {
          from,
          to: target,
          at: Utc::now(),
        }));
        Ok(true)
      }
      Err(e) => {
        warn!(tab = %target, error = %e, "tab failed to initialize");
        Err(e)
      }
    };

    self.loading = false;
    outcome
  }

  pub fn active(&self) -> TabId {
    self.state.active
  }

  pub fn state(&self) -> TabState {
    self.state
  }

  /// True while switching or while the active view is fetching
  pub fn is_loading(&self) -> bool {
    self.loading || self.view.as_ref().is_some_and(|v| v.is_loading())
  }

  /// Re-run the active view's load if `tab` is still the active one
  pub fn refresh(&mut self, tab: TabId) {
    if tab != self.state.active {
      debug!(tab = %tab, "dropping refresh for inactive tab");
      return;
    }
    if let Some(view) = self.view.as_mut() {
      view.refresh();
    }
  }

  pub fn tick(&mut self) {
    if let Some(view) = self.view.as_mut() {
      view.tick();
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.view.as_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    }
  }

  pub fn is_capturing_input(&self) -> bool {
    self.view.as_ref().is_some_and(|v| v.is_capturing_input())
  }

  pub fn view(&self) -> Option<&dyn TabView> {
    self.view.as_deref()
  }

  pub fn render(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.view.as_mut() {
      view.render(frame, area);
    }
  }

  /// Deactivate the mounted view before shutdown
  pub fn close(&mut self) {
    if let Some(mut view) = self.view.take() {
      view.deactivate();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::view::ShortcutInfo;
  use color_eyre::eyre::eyre;
  use std::sync::{Arc, Mutex};
  use tokio::sync::mpsc;

  type Log = Arc<Mutex<Vec<String>>>;

  struct RecordingView {
    tab: TabId,
    log: Log,
    fail_init: bool,
  }

  impl TabView for RecordingView {
    fn tab(&self) -> TabId {
      self.tab
    }

    fn init(&mut self) -> Result<()> {
      self.log.lock().unwrap().push(format!("init:{}", self.tab));
      if self.fail_init {
        return Err(eyre!("backend down"));
      }
      Ok(())
    }

    fn deactivate(&mut self) {
      self.log.lock().unwrap().push(format!("deactivate:{}", self.tab));
    }

    fn refresh(&mut self) {
      self.log.lock().unwrap().push(format!("refresh:{}", self.tab));
    }

    fn handle_key(&mut self, _key: KeyEvent) -> ViewAction {
      ViewAction::None
    }

    fn render(&mut self, _frame: &mut Frame, _area: Rect) {}

    fn shortcuts(&self) -> Vec<ShortcutInfo> {
      Vec::new()
    }
  }

  fn router(
    initial: TabId,
    failing: Option<TabId>,
  ) -> (Router, Log, mpsc::UnboundedReceiver<Event>) {
    let log: Log = Arc::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let factory_log = log.clone();
    let factory: ViewFactory = Box::new(move |tab| {
      factory_log.lock().unwrap().push(format!("mount:{}", tab));
      Box::new(RecordingView {
        tab,
        log: factory_log.clone(),
        fail_init: failing == Some(tab),
      })
    });
    (Router::new(initial, factory, tx), log, rx)
  }

  fn transitions(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<(TabId, TabId)> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
      if let Event::TabChanged(t) = event {
        out.push((t.from, t.to));
      }
    }
    out
  }

  #[test]
  fn test_resolve_initial() {
    assert_eq!(resolve_initial(Some("validate")), TabId::Validate);
    assert_eq!(resolve_initial(Some("reports")), HOME_TAB);
    assert_eq!(resolve_initial(None), HOME_TAB);
  }

  #[test]
  fn test_hotkeys_and_cycling() {
    assert_eq!(TabId::Dashboard.hotkey(), '1');
    assert_eq!(TabId::from_hotkey('5'), Some(TabId::Control));
    assert_eq!(TabId::from_hotkey('0'), None);
    assert_eq!(TabId::from_hotkey('6'), None);
    assert_eq!(TabId::Control.next(), TabId::Dashboard);
    assert_eq!(TabId::Dashboard.previous(), TabId::Control);
  }

  #[test]
  fn test_tab_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&TabId::Control).unwrap(), "\"control\"");
  }

  #[test]
  fn test_switch_deactivates_before_init() {
    let (mut router, log, mut rx) = router(TabId::Dashboard, None);
    router.open().unwrap();
    router.show_tab("generate").unwrap();
    log.lock().unwrap().clear();
    transitions(&mut rx);

    assert!(router.show_tab("validate").unwrap());

    assert_eq!(
      *log.lock().unwrap(),
      vec!["deactivate:generate", "mount:validate", "init:validate"]
    );
    assert_eq!(transitions(&mut rx), vec![(TabId::Generate, TabId::Validate)]);
    assert_eq!(router.active(), TabId::Validate);
    assert_eq!(router.state().previous, Some(TabId::Generate));
    assert!(!router.is_loading());
  }

  #[test]
  fn test_unknown_and_current_tab_are_noops() {
    let (mut router, log, mut rx) = router(TabId::Admin, None);
    router.open().unwrap();
    log.lock().unwrap().clear();

    assert!(!router.show_tab("nonexistent").unwrap());
    assert!(!router.show_tab("admin").unwrap());

    assert!(log.lock().unwrap().is_empty());
    assert!(transitions(&mut rx).is_empty());
    assert_eq!(router.active(), TabId::Admin);
  }

  #[test]
  fn test_open_emits_no_transition() {
    let (mut router, log, mut rx) = router(TabId::Control, None);
    router.open().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["mount:control", "init:control"]);
    assert!(transitions(&mut rx).is_empty());
  }

  #[test]
  fn test_failed_init_clears_loading() {
    let (mut router, _log, mut rx) = router(TabId::Dashboard, Some(TabId::Control));
    router.open().unwrap();

    let result = router.show(TabId::Control);

    assert!(result.is_err());
    assert!(!router.is_loading());
    assert_eq!(router.active(), TabId::Control);
    assert!(router.view().is_some());
    assert!(transitions(&mut rx).is_empty());
  }

  #[test]
  fn test_refresh_only_reaches_active_tab() {
    let (mut router, log, _rx) = router(TabId::Dashboard, None);
    router.open().unwrap();
    router.show(TabId::Control).unwrap();
    log.lock().unwrap().clear();

    router.refresh(TabId::Dashboard);
    router.refresh(TabId::Control);

    assert_eq!(*log.lock().unwrap(), vec!["refresh:control"]);
  }
}
