use crate::cache::TtlCache;
use crate::commands::CommandAction;
use crate::config::Config;
use crate::context::AppContext;
use crate::event::{Event, EventHandler, EventSender};
use crate::license::{CacheTtls, CachedLicenseClient, LicenseApi, LicenseClient};
use crate::nav::{resolve_initial, Router, TabId};
use crate::notifications::{Notification, NotificationCenter};
use crate::schedule::ScheduledTask;
use crate::storage::{keys, KvStore};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::ViewAction;
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use serde_json::Value;
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TICK_RATE: Duration = Duration::from_millis(250);

const WELCOME: &str = "Welcome to licdeck. Press 1-5 to switch tabs or : for commands.";

/// Main application state
pub struct App {
  ctx: AppContext,

  /// Shared with the cached client; cleared by `:clear-cache`
  cache: Arc<TtlCache<Value>>,

  router: Router,
  notifications: NotificationCenter,
  command: CommandInput,
  title: String,

  /// Advances every tick while something is loading
  spinner: usize,

  /// Drops expired cache entries; stops when the app is dropped
  sweeper: Option<ScheduledTask>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, tab_override: Option<TabId>, events: EventSender) -> Result<Self> {
    let cache = Arc::new(TtlCache::new());
    let client = CachedLicenseClient::new(
      LicenseClient::new(&config.server)?,
      cache.clone(),
      CacheTtls::from(&config.cache),
    );
    let store = Arc::new(KvStore::open()?);
    let sweep_every = config.cache.sweep_interval();

    let mut app = Self::with_parts(config, Arc::new(client), store, cache, tab_override, events);
    let sweeper = spawn_sweeper(app.cache.clone(), sweep_every);
    debug!(every = ?sweeper.period(), "cache sweeper started");
    app.sweeper = Some(sweeper);
    Ok(app)
  }

  /// Assemble an app around already built services
  pub fn with_parts(
    config: Config,
    api: Arc<dyn LicenseApi>,
    store: Arc<KvStore>,
    cache: Arc<TtlCache<Value>>,
    tab_override: Option<TabId>,
    events: EventSender,
  ) -> Self {
    let title = config.display_title();
    let ctx = AppContext::new(api, store, Arc::new(config), events.clone());

    let stored: Option<String> = ctx.store.get(keys::LAST_TAB).unwrap_or_else(|e| {
      warn!(error = %e, "could not read last tab");
      None
    });
    let initial = tab_override.unwrap_or_else(|| resolve_initial(stored.as_deref()));

    let factory_ctx = ctx.clone();
    let router = Router::new(
      initial,
      Box::new(move |tab| ui::views::build(tab, &factory_ctx)),
      events,
    );

    Self {
      ctx,
      cache,
      router,
      notifications: NotificationCenter::new(),
      command: CommandInput::new(),
      title,
      spinner: 0,
      sweeper: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, events: &mut EventHandler) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal, events).await;

    self.shutdown();
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    self.start();

    while !self.should_quit() {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  /// Greet first-time operators and mount the initial tab
  pub fn start(&mut self) {
    let seen: Option<bool> = self.ctx.store.get(keys::FIRST_VISIT).unwrap_or(None);
    if seen.is_none() {
      self.notifications.push(Notification::info(WELCOME));
      if let Err(e) = self.ctx.store.set(keys::FIRST_VISIT, &true) {
        warn!(error = %e, "could not record first visit");
      }
    }

    if let Err(e) = self.router.open() {
      self.notifications.push(Notification::error(format!(
        "Could not open {}: {}",
        self.router.active().title(),
        e
      )));
    }
    info!(tab = %self.router.active(), server = %self.ctx.config.server.url, "console started");
  }

  fn shutdown(&mut self) {
    self.router.close();
    self.persist_tab(self.router.active());
    if let Some(sweeper) = self.sweeper.take() {
      sweeper.stop();
    }
    info!("console stopped");
  }

  pub fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        self.notifications.prune(Utc::now());
        self.router.tick();
        if self.router.is_loading() {
          self.spinner = self.spinner.wrapping_add(1);
        }
      }
      Event::Refresh(tab) => self.router.refresh(tab),
      Event::TabChanged(transition) => {
        debug!(from = %transition.from, to = %transition.to, "tab changed");
        self.persist_tab(transition.to);
      }
      Event::Notify(notification) => self.notifications.push(notification),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if self.command.is_active() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(command)) => self.run_command(command.action),
        KeyResult::Event(CommandEvent::Unknown(input)) if !input.is_empty() => self
          .notifications
          .push(Notification::warning(format!("Unknown command: {}", input))),
        _ => {}
      }
      return;
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Forms, pickers and dialogs get every key, including q and digits
    if self.router.is_capturing_input() {
      let action = self.router.handle_key(key);
      self.apply(action);
      return;
    }

    match key.code {
      KeyCode::Char(':') => self.command.activate(),
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('[') => self.switch(self.router.active().previous()),
      KeyCode::Char(']') => self.switch(self.router.active().next()),
      KeyCode::Char(c) if TabId::from_hotkey(c).is_some() => {
        if let Some(tab) = TabId::from_hotkey(c) {
          self.switch(tab);
        }
      }
      _ => {
        let action = self.router.handle_key(key);
        if action == ViewAction::Unhandled && matches!(key.code, KeyCode::Char('x') | KeyCode::Esc)
        {
          self.notifications.dismiss();
        }
        self.apply(action);
      }
    }
  }

  fn apply(&mut self, action: ViewAction) {
    if let ViewAction::Navigate(tab) = action {
      self.switch(tab);
    }
  }

  fn switch(&mut self, tab: TabId) {
    if let Err(e) = self.router.show(tab) {
      self
        .notifications
        .push(Notification::error(format!("Could not open {}: {}", tab.title(), e)));
    }
  }

  fn run_command(&mut self, action: CommandAction) {
    match action {
      CommandAction::Open(tab) => self.switch(tab),
      CommandAction::Refresh => self.router.refresh(self.router.active()),
      CommandAction::ClearCache => {
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "cache cleared");
        self
          .notifications
          .push(Notification::success(format!("Cache cleared ({} entries)", dropped)));
      }
      CommandAction::Reset => self.reset(),
      CommandAction::Quit => self.should_quit = true,
    }
  }

  /// Forget cached responses and everything stored under our prefix
  fn reset(&mut self) {
    self.cache.clear();
    match self.ctx.store.clear() {
      Ok(removed) => {
        info!(removed, "stored state cleared");
        self.persist_tab(self.router.active());
        self
          .notifications
          .push(Notification::success("Cache and stored state cleared"));
      }
      Err(e) => self
        .notifications
        .push(Notification::error(format!("Could not clear stored state: {}", e))),
    }
    self.router.refresh(self.router.active());
  }

  fn persist_tab(&self, tab: TabId) {
    if let Err(e) = self.ctx.store.set(keys::LAST_TAB, tab.as_str()) {
      warn!(error = %e, tab = %tab, "could not save last tab");
    }
  }

  pub fn router(&self) -> &Router {
    &self.router
  }

  pub fn router_mut(&mut self) -> &mut Router {
    &mut self.router
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn spinner_frame(&self) -> usize {
    self.spinner
  }

  pub fn notifications(&self) -> &NotificationCenter {
    &self.notifications
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}

fn spawn_sweeper(cache: Arc<TtlCache<Value>>, every: Duration) -> ScheduledTask {
  ScheduledTask::every(every, move || {
    let removed = cache.sweep_expired();
    if removed > 0 {
      debug!(removed, "swept expired cache entries");
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::fake::FakeApi;
  use crate::notifications::NotificationLevel;
  use serde_json::json;
  use tokio::sync::mpsc;

  struct Harness {
    app: App,
    rx: mpsc::UnboundedReceiver<Event>,
    store: Arc<KvStore>,
    cache: Arc<TtlCache<Value>>,
  }

  impl Harness {
    fn new(store: Arc<KvStore>, tab_override: Option<TabId>) -> Self {
      let (tx, rx) = mpsc::unbounded_channel();
      let cache = Arc::new(TtlCache::new());
      let app = App::with_parts(
        Config::default(),
        Arc::new(FakeApi::new()),
        store.clone(),
        cache.clone(),
        tab_override,
        tx,
      );
      Self {
        app,
        rx,
        store,
        cache,
      }
    }

    fn press(&mut self, code: KeyCode) {
      self.app.handle_event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
      self.pump();
    }

    fn type_text(&mut self, text: &str) {
      for c in text.chars() {
        self.press(KeyCode::Char(c));
      }
    }

    /// Feed back events the app sent to itself
    fn pump(&mut self) {
      while let Ok(event) = self.rx.try_recv() {
        if !matches!(event, Event::Refresh(_)) {
          self.app.handle_event(event);
        }
      }
    }
  }

  fn store() -> Arc<KvStore> {
    Arc::new(KvStore::in_memory().unwrap())
  }

  #[tokio::test]
  async fn test_welcome_only_on_first_visit() {
    let store = store();
    let mut first = Harness::new(store.clone(), None);
    first.app.start();
    let welcome = first.app.notifications().latest().unwrap();
    assert_eq!(welcome.level, NotificationLevel::Info);
    assert!(welcome.message.starts_with("Welcome"));
    first.app.shutdown();

    let mut second = Harness::new(store, None);
    second.app.start();
    assert!(second.app.notifications().is_empty());
    second.app.shutdown();
  }

  #[tokio::test]
  async fn test_restores_last_tab_unless_overridden() {
    let store = store();
    store.set(keys::LAST_TAB, "validate").unwrap();

    let mut restored = Harness::new(store.clone(), None);
    restored.app.start();
    assert_eq!(restored.app.router().active(), TabId::Validate);
    restored.app.shutdown();

    let mut overridden = Harness::new(store, Some(TabId::Control));
    overridden.app.start();
    assert_eq!(overridden.app.router().active(), TabId::Control);
    overridden.app.shutdown();
  }

  #[tokio::test]
  async fn test_hotkeys_switch_and_persist_tab() {
    let mut h = Harness::new(store(), None);
    h.app.start();
    assert_eq!(h.app.router().active(), TabId::Dashboard);

    h.press(KeyCode::Char('4'));
    assert_eq!(h.app.router().active(), TabId::Admin);
    let saved: Option<String> = h.store.get(keys::LAST_TAB).unwrap();
    assert_eq!(saved.as_deref(), Some("admin"));

    h.press(KeyCode::Char(']'));
    assert_eq!(h.app.router().active(), TabId::Control);
    h.press(KeyCode::Char('['));
    h.press(KeyCode::Char('['));
    assert_eq!(h.app.router().active(), TabId::Validate);
    h.app.shutdown();
  }

  #[tokio::test]
  async fn test_quick_action_navigates() {
    let mut h = Harness::new(store(), None);
    h.app.start();
    h.press(KeyCode::Char('g'));
    assert_eq!(h.app.router().active(), TabId::Generate);
    h.app.shutdown();
  }

  #[tokio::test]
  async fn test_command_palette_captures_q() {
    let mut h = Harness::new(store(), None);
    h.app.start();

    h.press(KeyCode::Char(':'));
    h.press(KeyCode::Char('q'));
    assert!(!h.app.should_quit());
    h.press(KeyCode::Esc);
    assert!(!h.app.command().is_active());

    h.press(KeyCode::Char('q'));
    assert!(h.app.should_quit());
    h.app.shutdown();
  }

  #[tokio::test]
  async fn test_clear_cache_command() {
    let mut h = Harness::new(store(), None);
    h.app.start();
    h.cache.set("modules", json!([]), Duration::from_secs(60));

    h.press(KeyCode::Char(':'));
    h.type_text("clear-cache");
    h.press(KeyCode::Enter);

    assert!(h.cache.is_empty());
    let latest = h.app.notifications().latest().unwrap();
    assert_eq!(latest.level, NotificationLevel::Success);
    assert!(latest.message.contains("1 entries"));
    h.app.shutdown();
  }

  #[tokio::test]
  async fn test_reset_command_forgets_stored_state() {
    let mut h = Harness::new(store(), None);
    h.app.start();
    h.press(KeyCode::Char('3'));
    h.cache.set("modules", json!([]), Duration::from_secs(60));
    h.store.set(keys::VALIDATION_HISTORY, &json!([])).unwrap();

    h.press(KeyCode::Char(':'));
    h.type_text("reset");
    h.press(KeyCode::Enter);

    assert!(h.cache.is_empty());
    let history: Option<Value> = h.store.get(keys::VALIDATION_HISTORY).unwrap();
    assert!(history.is_none());
    let seen: Option<bool> = h.store.get(keys::FIRST_VISIT).unwrap();
    assert!(seen.is_none());
    let tab: Option<String> = h.store.get(keys::LAST_TAB).unwrap();
    assert_eq!(tab.as_deref(), Some("validate"));
    let latest = h.app.notifications().latest().unwrap();
    assert_eq!(latest.level, NotificationLevel::Success);
    h.app.shutdown();
  }

  #[tokio::test]
  async fn test_unknown_command_warns() {
    let mut h = Harness::new(store(), None);
    h.app.start();
    h.press(KeyCode::Char(':'));
    h.type_text("zzz");
    h.press(KeyCode::Enter);

    let latest = h.app.notifications().latest().unwrap();
    assert_eq!(latest.level, NotificationLevel::Warning);
    assert!(latest.message.contains("zzz"));
    h.app.shutdown();
  }
}
