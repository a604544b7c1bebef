use super::{detail_line, refresh_trigger};
use crate::context::AppContext;
use crate::controllers::control_panel::{
  block_prompt, load_control, toggle_prompt, ControlData, LicenseBook, LicenseStatus,
};
use crate::license::types::{display_date, DashboardStats, License, MutationResponse, Purchases};
use crate::nav::TabId;
use crate::notifications::Notification;
use crate::query::{Pending, Query, QueryState};
use crate::schedule::AutoRefresh;
use crate::ui::components::{
  ConfirmDialog, ConfirmEvent, KeyResult, Picker, PickerEvent, PickerItem, SearchEvent,
  SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{draw_error_panel, draw_placeholder, license_status_color, truncate};
use crate::ui::view::{ShortcutInfo, TabView, ViewAction};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
enum ControlAction {
  Toggle { license_id: i64 },
  Block { license_id: i64, module_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
  Licenses,
  Purchases,
}

/// Issued licenses with stats, filters and admin actions
pub struct ControlPanelView {
  ctx: AppContext,
  query: Query<ControlData>,
  purchases: Query<Purchases>,
  book: LicenseBook,
  list_state: ListState,
  panel: Panel,
  search: SearchInput,
  picker: Picker,
  picking_for: Option<i64>,
  confirm: ConfirmDialog<ControlAction>,
  mutation: Option<(ControlAction, Pending<MutationResponse>)>,
  stats_reload: Option<Pending<DashboardStats>>,
  auto_refresh: AutoRefresh,
}

impl ControlPanelView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let query = Query::new(move || {
      let api = api.clone();
      async move { load_control(api.as_ref()).await.map_err(|e| e.to_string()) }
    });
    let api = ctx.api.clone();
    let purchases = Query::new(move || {
      let api = api.clone();
      async move { api.purchases().await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      query,
      purchases,
      book: LicenseBook::default(),
      list_state: ListState::default(),
      panel: Panel::Licenses,
      search: SearchInput::new("Search licenses"),
      picker: Picker::new(),
      picking_for: None,
      confirm: ConfirmDialog::new(),
      mutation: None,
      stats_reload: None,
      auto_refresh: AutoRefresh::new(),
    }
  }

  fn visible(&self) -> Vec<&License> {
    self.book.visible(Utc::now())
  }

  fn selected(&self) -> Option<&License> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).copied()
  }

  fn ask_toggle(&mut self) {
    let Some(license) = self.selected() else {
      return;
    };
    let prompt = toggle_prompt(license);
    let action = ControlAction::Toggle {
      license_id: license.id,
    };
    self.confirm.show(prompt, action);
  }

  fn pick_module_to_block(&mut self) {
    let Some(license) = self.selected() else {
      return;
    };
    if license.allowed_modules.is_empty() {
      let message = format!("{} has no modules to block", license.client_name);
      self.ctx.notify(Notification::warning(message));
      return;
    }

    let license_id = license.id;
    let items = license
      .allowed_modules
      .iter()
      .map(|m| PickerItem::new(m.as_str(), m.as_str()))
      .collect();
    self.picker.show_single("Block module", items, None);
    self.picking_for = Some(license_id);
  }

  fn ask_block(&mut self, license_id: i64, module_name: String) {
    let Some(license) = self.book.get(license_id) else {
      return;
    };
    let prompt = block_prompt(&module_name, license);
    self.confirm.show(
      prompt,
      ControlAction::Block {
        license_id,
        module_name,
      },
    );
  }

  fn run(&mut self, action: ControlAction) {
    if self.mutation.is_some() {
      self
        .ctx
        .notify(Notification::info("Another change is still in progress"));
      return;
    }
    info!(action = ?action, "license control");

    let api = self.ctx.api.clone();
    let task = action.clone();
    let pending = Pending::spawn(async move {
      let response = match &task {
        ControlAction::Toggle { license_id } => api.toggle_license(*license_id).await,
        ControlAction::Block {
          license_id,
          module_name,
        } => api.block_module(*license_id, module_name).await,
      };
      response.map_err(|e| e.to_string())
    });
    self.mutation = Some((action, pending));
  }

  fn reload_stats(&mut self) {
    let api = self.ctx.api.clone();
    self.stats_reload = Some(Pending::spawn(async move {
      api.dashboard_stats().await.map_err(|e| e.to_string())
    }));
  }

  fn poll_mutation(&mut self) {
    let Some(result) = self.mutation.as_mut().and_then(|(_, p)| p.poll()) else {
      return;
    };
    let Some((action, _)) = self.mutation.take() else {
      return;
    };

    let response = match result {
      Ok(response) if response.success => response,
      Ok(response) => {
        let message = response.message_or("The server refused the change");
        self.ctx.notify(Notification::error(message));
        return;
      }
      Err(e) => {
        self
          .ctx
          .notify(Notification::error(format!("Change failed: {}", e)));
        return;
      }
    };

    // A refresh already in flight would bring back the list from before the change
    if self.query.is_loading() {
      self.query.reload();
    }

    match action {
      ControlAction::Toggle { license_id } => {
        self.book.apply_toggle(license_id, &response);
        let state = match self.book.get(license_id) {
          Some(l) if l.is_active => "activated",
          _ => "deactivated",
        };
        let message = response.message_or(&format!("License {}", state));
        self.ctx.notify(Notification::success(message));
        self.reload_stats();
      }
      ControlAction::Block {
        license_id,
        module_name,
      } => {
        self.book.apply_block(license_id, &response);
        let message = response.message_or(&format!("Module '{}' blocked", module_name));
        self.ctx.notify(Notification::success(message));
      }
    }
  }

  fn poll_stats(&mut self) {
    let Some(result) = self.stats_reload.as_mut().and_then(|p| p.poll()) else {
      return;
    };
    self.stats_reload = None;
    match result {
      Ok(stats) => {
        if let Some(data) = self.query.data_mut() {
          data.stats = stats;
        }
      }
      Err(e) => self
        .ctx
        .notify(Notification::warning(format!("Could not reload stats: {}", e))),
    }
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(action)) => {
        self.run(action);
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Picked(values)) => {
        let license_id = self.picking_for.take();
        if let (Some(license_id), Some(module_name)) = (license_id, values.into_iter().next()) {
          self.ask_block(license_id, module_name);
        }
        return Some(ViewAction::None);
      }
      KeyResult::Event(PickerEvent::Cancelled) => {
        self.picking_for = None;
        return Some(ViewAction::None);
      }
      KeyResult::Handled => return Some(ViewAction::None),
      KeyResult::NotHandled => {}
    }

    if self.panel == Panel::Licenses {
      match self.search.handle_key(key) {
        KeyResult::Event(SearchEvent::Changed(term)) => {
          self.book.filter.search = term;
          self.list_state.select(Some(0));
          return Some(ViewAction::None);
        }
        KeyResult::NotHandled => {}
        _ => return Some(ViewAction::None),
      }
    }
    None
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect, stats: &DashboardStats) {
    let stat = |label: &'static str, value: i64, color: Color| {
      vec![
        Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value.to_string(), Style::default().fg(color).bold()),
        Span::raw("   "),
      ]
    };
    let mut spans = Vec::new();
    spans.extend(stat("Total", stats.total_licenses, Color::Cyan));
    spans.extend(stat("Active", stats.active_licenses, Color::Green));
    spans.extend(stat("Expired", stats.expired_licenses, Color::Red));
    spans.extend(stat("Validations 24h", stats.recent_validations_24h, Color::Yellow));

    let filter = &self.book.filter;
    let search = match filter.search.trim() {
      "" => "-".to_string(),
      term => term.to_string(),
    };
    let filters = Line::from(vec![
      Span::styled(" search ", Style::default().fg(Color::DarkGray)),
      Span::raw(search),
      Span::styled("  type ", Style::default().fg(Color::DarkGray)),
      Span::raw(filter.license_type.clone().unwrap_or_else(|| "all".into())),
      Span::styled("  status ", Style::default().fg(Color::DarkGray)),
      Span::raw(filter.status.label()),
    ]);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(vec![Line::from(spans), filters]).block(block),
      area,
    );
  }

  fn render_licenses(&mut self, frame: &mut Frame, area: Rect) {
    let [list_area, detail_area] =
      Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
    let now = Utc::now();

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|l| {
        let status = LicenseStatus::of(l, now);
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<9}", status.label()),
            Style::default().fg(license_status_color(status)),
          ),
          Span::styled(
            format!("{:<22}", truncate(&l.client_name, 22)),
            Style::default().fg(Color::White),
          ),
          Span::styled(
            format!(" {:<12}", truncate(l.license_type.as_deref().unwrap_or("-"), 12)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!(" {}", display_date(l.expiry_date.as_deref())),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    ensure_valid_selection(&mut self.list_state, items.len());

    let title = format!(" Licenses ({}/{}) ", items.len(), self.book.all().len());
    let list = List::new(items)
      .block(
        Block::default()
          .title(title)
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      )
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut self.list_state);

    let block = Block::default()
      .title(" License ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let lines = match self.selected() {
      Some(l) => {
        let status = LicenseStatus::of(l, now);
        let users = format!(
          "{} / {}",
          l.current_users.unwrap_or(0),
          l.max_users.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
        );
        vec![
          detail_line("Key:         ", &l.license_key),
          detail_line("Client:      ", &l.client_name),
          detail_line("Email:       ", l.client_email.as_deref().unwrap_or("-")),
          detail_line("Type:        ", l.license_type.as_deref().unwrap_or("-")),
          Line::from(vec![
            Span::styled("Status:      ", Style::default().fg(Color::DarkGray)),
            Span::styled(status.label(), Style::default().fg(license_status_color(status))),
          ]),
          detail_line("Issued:      ", &display_date(l.issued_date.as_deref())),
          detail_line("Expires:     ", &display_date(l.expiry_date.as_deref())),
          detail_line("Users:       ", &users),
          detail_line(
            "Validations: ",
            &l.validation_count.unwrap_or(0).to_string(),
          ),
          Line::default(),
          detail_line("Modules:     ", &l.allowed_modules.join(", ")),
        ]
      }
      None => vec![Line::from("No license selected").dark_gray()],
    };
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      detail_area,
    );
  }

  fn render_purchases(&self, frame: &mut Frame, area: Rect) {
    let purchases = match self.purchases.state() {
      QueryState::Success(purchases) => purchases,
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "Purchases", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "Purchases", "Loading purchases...");
        return;
      }
    };

    let items: Vec<ListItem> = purchases
      .purchases
      .iter()
      .map(|p| {
        let amount = p
          .amount
          .map(|a| format!("${:.2}", a))
          .unwrap_or_else(|| "-".into());
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", display_date(p.purchase_date.as_deref())),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<22}", truncate(&p.client_name, 22)),
            Style::default().fg(Color::White),
          ),
          Span::styled(
            format!(" {:<12}", truncate(p.license_type.as_deref().unwrap_or("-"), 12)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(format!(" {:>10}", amount), Style::default().fg(Color::Green)),
          Span::raw(format!("  {}", p.modules.join(", "))),
        ]))
      })
      .collect();

    let title = format!(
      " Purchases ({}, {} licenses generated) ",
      purchases.total_purchases, purchases.total_licenses_generated
    );
    let list = List::new(items).block(
      Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(list, area);
  }
}

impl TabView for ControlPanelView {
  fn tab(&self) -> TabId {
    TabId::Control
  }

  fn init(&mut self) -> Result<()> {
    self.query.fetch();
    self.auto_refresh.start(
      self.ctx.config.refresh.control(),
      refresh_trigger(&self.ctx, TabId::Control),
    );
    Ok(())
  }

  fn deactivate(&mut self) {
    self.auto_refresh.stop();
  }

  fn refresh(&mut self) {
    self.query.refresh();
    if self.panel == Panel::Purchases {
      self.purchases.refresh();
    }
  }

  fn tick(&mut self) {
    self.poll_mutation();
    if self.query.poll() {
      if let Some(data) = self.query.data() {
        self.book.replace(data.licenses.clone());
      }
    }
    self.purchases.poll();
    self.poll_stats();
  }

  fn is_loading(&self) -> bool {
    self.query.is_loading()
      || self.purchases.is_loading()
      || self.mutation.is_some()
      || self.stats_reload.is_some()
  }

  fn is_capturing_input(&self) -> bool {
    self.confirm.is_active() || self.picker.is_active() || self.search.is_active()
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(action) = self.handle_overlays(key) {
      return action;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('t') => {
        self.book.cycle_type_filter();
        self.list_state.select(Some(0));
      }
      KeyCode::Char('s') => {
        self.book.filter.status = self.book.filter.status.next();
        self.list_state.select(Some(0));
      }
      KeyCode::Char('x') | KeyCode::Char(' ') => self.ask_toggle(),
      KeyCode::Char('b') => self.pick_module_to_block(),
      KeyCode::Char('p') => {
        self.panel = match self.panel {
          Panel::Licenses => {
            self.purchases.fetch();
            Panel::Purchases
          }
          Panel::Purchases => Panel::Licenses,
        };
      }
      KeyCode::Esc if self.panel == Panel::Purchases => self.panel = Panel::Licenses,
      KeyCode::Char('r') => {
        self.query.refetch();
        if self.panel == Panel::Purchases {
          self.purchases.refetch();
        }
      }
      _ => return ViewAction::Unhandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let stats = match self.query.state() {
      QueryState::Success(data) => data.stats.clone(),
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "Control panel", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "Control panel", "Loading licenses...");
        return;
      }
    };

    let [stats_area, body] =
      Layout::vertical([Constraint::Length(4), Constraint::Min(3)]).areas(area);
    self.render_stats(frame, stats_area, &stats);
    match self.panel {
      Panel::Licenses => self.render_licenses(frame, body),
      Panel::Purchases => self.render_purchases(frame, body),
    }

    self.search.render_overlay(frame, area);
    self.picker.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "search").with_priority(1),
      ShortcutInfo::new("t/s", "type/status").with_priority(2),
      ShortcutInfo::new("x", "toggle").with_priority(3),
      ShortcutInfo::new("b", "block module").with_priority(4),
      ShortcutInfo::new("p", "purchases").with_priority(5),
    ]
  }
}
