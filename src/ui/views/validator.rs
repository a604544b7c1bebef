use super::detail_line;
use crate::context::AppContext;
use crate::controllers::validator::{
  parse_renewal_days, HistoryEntry, ValidationForm, ValidationHistory, DEFAULT_RENEWAL_DAYS,
};
use crate::hardware::hardware_info;
use crate::license::types::{display_date, LicenseInfo, Module, MutationResponse, ValidationResult};
use crate::nav::TabId;
use crate::notifications::Notification;
use crate::query::{Pending, Query};
use crate::ui::components::{
  ConfirmDialog, ConfirmEvent, Form, FormEvent, InputResult, KeyResult, Picker, PickerEvent,
  PickerItem, TextInput,
};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, TabView, ViewAction};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum LicenseAction {
  Renew { license_key: String, days: u32 },
  Deactivate { license_key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormTarget {
  UserCount,
  RenewalDays,
}

struct Validating {
  pending: Pending<ValidationResult>,
  license_key: String,
  module_name: String,
}

/// Validation, lookup and lifecycle actions for a single license key
pub struct ValidatorView {
  ctx: AppContext,
  modules: Query<Vec<Module>>,
  form: ValidationForm,
  history: ValidationHistory,
  result: Option<ValidationResult>,
  info: Option<LicenseInfo>,
  validating: Option<Validating>,
  lookup: Option<Pending<LicenseInfo>>,
  mutation: Option<(LicenseAction, Pending<MutationResponse>)>,
  key_input: Option<TextInput>,
  prompt: Form,
  prompting: Option<FormTarget>,
  picker: Picker,
  confirm: ConfirmDialog<LicenseAction>,
}

impl ValidatorView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let modules = Query::new(move || {
      let api = api.clone();
      async move { api.modules().await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      modules,
      form: ValidationForm::default(),
      history: ValidationHistory::default(),
      result: None,
      info: None,
      validating: None,
      lookup: None,
      mutation: None,
      key_input: None,
      prompt: Form::new(),
      prompting: None,
      picker: Picker::new(),
      confirm: ConfirmDialog::new(),
    }
  }

  fn license_key(&self) -> Option<String> {
    let key = self.form.license_key.trim();
    if key.is_empty() {
      self
        .ctx
        .notify(Notification::warning("Enter a license key first (k)"));
      None
    } else {
      Some(key.to_string())
    }
  }

  fn edit_key(&mut self) {
    self.key_input = Some(TextInput::with_value(&self.form.license_key));
  }

  /// Key input reformats on every edit
  fn handle_key_input(&mut self, key: KeyEvent) -> bool {
    let Some(input) = self.key_input.as_mut() else {
      return false;
    };
    match input.handle_key(key) {
      InputResult::Consumed => {
        self.form.set_license_key(input.value());
        input.set_value(&self.form.license_key);
      }
      InputResult::Submitted(_) | InputResult::Cancelled => self.key_input = None,
      InputResult::NotHandled => {}
    }
    true
  }

  fn pick_module(&mut self) {
    let items: Vec<PickerItem> = self
      .modules
      .data()
      .map(|m| m.as_slice())
      .unwrap_or(&[])
      .iter()
      .map(|m| PickerItem::new(&m.name, m.label()))
      .collect();
    if items.is_empty() {
      self.ctx.notify(Notification::warning("No modules loaded"));
      return;
    }
    let current = self.form.module_name.clone();
    self.picker.show_single("Module", items, current.as_deref());
  }

  fn validate(&mut self) {
    if self.validating.is_some() {
      return;
    }
    let hardware = match hardware_info(&self.ctx.store, false, Utc::now()) {
      Ok(hardware) => hardware,
      Err(e) => {
        self.ctx.notify(Notification::error(format!("Hardware detection failed: {}", e)));
        return;
      }
    };
    let request = match self.form.validate(hardware) {
      Ok(request) => request,
      Err(e) => {
        self.ctx.notify(Notification::error(e.to_string()));
        return;
      }
    };

    let license_key = request.license_key.clone();
    let module_name = request.module_name.clone();
    let api = self.ctx.api.clone();
    self.validating = Some(Validating {
      pending: Pending::spawn(async move {
        api.validate_license(&request).await.map_err(|e| e.to_string())
      }),
      license_key,
      module_name,
    });
  }

  fn look_up(&mut self) {
    let Some(license_key) = self.license_key() else {
      return;
    };
    let api = self.ctx.api.clone();
    self.lookup = Some(Pending::spawn(async move {
      api.license_info(&license_key).await.map_err(|e| e.to_string())
    }));
  }

  fn run(&mut self, action: LicenseAction) {
    if self.mutation.is_some() {
      return;
    }
    let api = self.ctx.api.clone();
    let task = action.clone();
    info!(action = ?task, "license lifecycle action");
    let pending = Pending::spawn(async move {
      let response = match task {
        LicenseAction::Renew { license_key, days } => api.renew_license(&license_key, days).await,
        LicenseAction::Deactivate { license_key } => api.deactivate_license(&license_key).await,
      };
      response.map_err(|e| e.to_string())
    });
    self.mutation = Some((action, pending));
  }

  fn record(&mut self, license_key: String, module_name: String, result: ValidationResult) {
    self.history.record(HistoryEntry {
      timestamp: Utc::now(),
      license_key,
      module_name,
      result: result.clone(),
    });
    if let Err(e) = self.history.save(&self.ctx.store) {
      warn!(error = %e, "could not persist validation history");
    }
    self.result = Some(result);
  }

  fn clear_history(&mut self) {
    if self.history.entries().is_empty() {
      return;
    }
    match self.history.clear(&self.ctx.store) {
      Ok(()) => self
        .ctx
        .notify(Notification::info("Validation history cleared")),
      Err(e) => self
        .ctx
        .notify(Notification::error(format!("Could not clear history: {}", e))),
    }
  }

  fn poll_validation(&mut self) {
    let Some(result) = self.validating.as_mut().and_then(|v| v.pending.poll()) else {
      return;
    };
    let Some(done) = self.validating.take() else {
      return;
    };
    match result {
      Ok(result) => {
        let notice = if result.valid {
          Notification::success(result.summary())
        } else {
          Notification::warning(result.summary())
        };
        self.ctx.notify(notice);
        self.record(done.license_key, done.module_name, result);
      }
      Err(e) => self
        .ctx
        .notify(Notification::error(format!("Validation failed: {}", e))),
    }
  }

  fn poll_lookup(&mut self) {
    let Some(result) = self.lookup.as_mut().and_then(|p| p.poll()) else {
      return;
    };
    self.lookup = None;
    match result {
      Ok(info) => self.info = Some(info),
      Err(e) => {
        self.info = None;
        self
          .ctx
          .notify(Notification::error(format!("License lookup failed: {}", e)));
      }
    }
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
        self
          .ctx
          .notify(Notification::error(response.message_or("The server refused the request")));
        return;
      }
      Err(e) => {
        self.ctx.notify(Notification::error(format!("Request failed: {}", e)));
        return;
      }
    };

    match action {
      LicenseAction::Renew { license_key, days } => {
        let until = display_date(response.new_expiry_date.as_deref());
        self.ctx.notify(Notification::success(
          response.message_or(&format!("Renewed for {} days, now expires {}", days, until)),
        ));
        if let Some(info) = self.info.as_mut().filter(|i| i.license_key == license_key) {
          if response.new_expiry_date.is_some() {
            info.expiry_date = response.new_expiry_date.clone();
          }
        }
      }
      LicenseAction::Deactivate { license_key } => {
        self
          .ctx
          .notify(Notification::success(response.message_or("License deactivated")));
        if let Some(info) = self.info.as_mut().filter(|i| i.license_key == license_key) {
          info.is_active = false;
        }
      }
    }
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if self.handle_key_input(key) {
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(action)) => {
        self.run(action);
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    match self.prompt.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(values)) => {
        let value = values.into_iter().next().unwrap_or_default();
        match self.prompting.take() {
          Some(FormTarget::UserCount) => self.form.user_count = value.trim().to_string(),
          Some(FormTarget::RenewalDays) => self.confirm_renewal(&value),
          None => {}
        }
        return Some(ViewAction::None);
      }
      KeyResult::Event(FormEvent::Cancelled) => {
        self.prompting = None;
        return Some(ViewAction::None);
      }
      KeyResult::Handled => return Some(ViewAction::None),
      KeyResult::NotHandled => {}
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Picked(values)) => {
        self.form.module_name = values.into_iter().next();
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn confirm_renewal(&mut self, raw_days: &str) {
    let Some(license_key) = self.license_key() else {
      return;
    };
    match parse_renewal_days(raw_days) {
      Ok(days) => self.confirm.show(
        format!("Renew {} for {} days?", license_key, days),
        LicenseAction::Renew { license_key, days },
      ),
      Err(e) => self.ctx.notify(Notification::error(e.to_string())),
    }
  }

  fn render_form(&self, frame: &mut Frame, area: Rect) {
    let editing = self.key_input.is_some();
    let key_value = if self.form.license_key.is_empty() && !editing {
      "-".to_string()
    } else if editing {
      format!("{}_", self.form.license_key)
    } else {
      self.form.license_key.clone()
    };
    let key_style = if editing {
      Style::default().fg(Color::Yellow)
    } else {
      Style::default().fg(Color::Cyan).bold()
    };

    let mut lines = vec![
      Line::from(vec![
        Span::styled("Key:     ", Style::default().fg(Color::DarkGray)),
        Span::styled(key_value, key_style),
      ]),
      detail_line("Module:  ", self.form.module_name.as_deref().unwrap_or("-")),
      detail_line("Users:   ", &self.form.user_count),
    ];

    if self.validating.is_some() {
      lines.push(Line::default());
      lines.push(Line::from("Validating...").yellow());
    } else if let Some(result) = &self.result {
      lines.push(Line::default());
      let (label, color) = if result.valid {
        ("VALID", Color::Green)
      } else {
        ("INVALID", Color::Red)
      };
      lines.push(Line::from(vec![
        Span::styled(label, Style::default().fg(color).bold()),
        Span::raw("  "),
        Span::raw(result.summary()),
      ]));
      if let Some(client) = &result.client_name {
        lines.push(detail_line("Client:  ", client));
      }
      if result.expires_at.is_some() {
        lines.push(detail_line("Expires: ", &display_date(result.expires_at.as_deref())));
      }
      if let (Some(current), Some(max)) = (result.current_users, result.max_users) {
        lines.push(detail_line("In use:  ", &format!("{}/{} users", current, max)));
      }
    }

    let block = Block::default()
      .title(" Validate ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_info(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" License info ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(info) = &self.info else {
      let hint = if self.lookup.is_some() {
        "Looking up license..."
      } else {
        "Press i to look up the license key."
      };
      frame.render_widget(
        Paragraph::new(hint)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    };

    let (state, color) = if info.is_active {
      ("Active", Color::Green)
    } else {
      ("Inactive", Color::DarkGray)
    };
    let count = |n: Option<i64>| n.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
    let lines = vec![
      detail_line("Client:      ", &info.client_name),
      detail_line("Email:       ", info.client_email.as_deref().unwrap_or("-")),
      detail_line("Type:        ", info.license_type.as_deref().unwrap_or("-")),
      Line::from(vec![
        Span::styled("State:       ", Style::default().fg(Color::DarkGray)),
        Span::styled(state, Style::default().fg(color)),
      ]),
      detail_line("Issued:      ", &display_date(info.issued_date.as_deref())),
      detail_line("Expires:     ", &display_date(info.expiry_date.as_deref())),
      detail_line("Days left:   ", &count(info.days_remaining)),
      detail_line(
        "Users:       ",
        &format!("{}/{}", count(info.current_users), count(info.max_users)),
      ),
      detail_line("Validations: ", &count(info.total_validations)),
      detail_line("Last check:  ", &display_date(info.last_validation.as_deref())),
      detail_line("Modules:     ", &info.allowed_modules.join(", ")),
    ];
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_history(&self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = self
      .history
      .entries()
      .iter()
      .map(|entry| {
        let (mark, color) = if entry.result.valid {
          ("✓", Color::Green)
        } else {
          ("✗", Color::Red)
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} ", mark), Style::default().fg(color)),
          Span::styled(
            entry.timestamp.format("%m-%d %H:%M ").to_string(),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(format!("{:<19}", entry.license_key), Style::default().fg(Color::Cyan)),
          Span::raw(format!(" {:<12} ", truncate(&entry.module_name, 12))),
          Span::styled(
            truncate(&entry.result.summary(), 40),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();

    let block = Block::default()
      .title(format!(" History ({}) ", items.len()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(List::new(items).block(block), area);
  }
}

impl TabView for ValidatorView {
  fn tab(&self) -> TabId {
    TabId::Validate
  }

  fn init(&mut self) -> Result<()> {
    self.history = ValidationHistory::load(&self.ctx.store)?;
    self.modules.fetch();
    Ok(())
  }

  fn refresh(&mut self) {
    self.modules.refresh();
    match ValidationHistory::load(&self.ctx.store) {
      Ok(history) => self.history = history,
      Err(e) => warn!(error = %e, "could not reload validation history"),
    }
  }

  fn tick(&mut self) {
    if self.modules.poll() {
      if let Some(e) = self.modules.error() {
        self
          .ctx
          .notify(Notification::error(format!("Could not load modules: {}", e)));
      }
    }
    self.poll_validation();
    self.poll_lookup();
    self.poll_mutation();
  }

  fn is_loading(&self) -> bool {
    self.modules.is_loading()
      || self.validating.is_some()
      || self.lookup.is_some()
      || self.mutation.is_some()
  }

  fn is_capturing_input(&self) -> bool {
    self.key_input.is_some()
      || self.prompt.is_active()
      || self.picker.is_active()
      || self.confirm.is_active()
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(action) = self.handle_overlays(key) {
      return action;
    }

    match key.code {
      KeyCode::Char('k') => self.edit_key(),
      KeyCode::Char('m') => self.pick_module(),
      KeyCode::Char('u') => {
        self
          .prompt
          .show("Users", &[("User count", self.form.user_count.as_str())]);
        self.prompting = Some(FormTarget::UserCount);
      }
      KeyCode::Char('v') | KeyCode::Enter => self.validate(),
      KeyCode::Char('i') => self.look_up(),
      KeyCode::Char('n') => {
        if self.license_key().is_some() {
          let default_days = DEFAULT_RENEWAL_DAYS.to_string();
          self
            .prompt
            .show("Renew", &[("Renewal days", default_days.as_str())]);
          self.prompting = Some(FormTarget::RenewalDays);
        }
      }
      KeyCode::Char('d') => {
        if let Some(license_key) = self.license_key() {
          self.confirm.show(
            format!("Deactivate {}? Clients using it stop validating.", license_key),
            LicenseAction::Deactivate { license_key },
          );
        }
      }
      KeyCode::Char('c') => self.clear_history(),
      KeyCode::Char('r') => self.modules.refetch(),
      _ => return ViewAction::Unhandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [left, right] =
      Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);
    let [form, history] =
      Layout::vertical([Constraint::Length(12), Constraint::Min(3)]).areas(left);

    self.render_form(frame, form);
    self.render_history(frame, history);
    self.render_info(frame, right);

    self.prompt.render_overlay(frame, area);
    self.picker.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("k", "key").with_priority(1),
      ShortcutInfo::new("m", "module").with_priority(2),
      ShortcutInfo::new("u", "users").with_priority(3),
      ShortcutInfo::new("v", "validate").with_priority(4),
      ShortcutInfo::new("i", "info"),
      ShortcutInfo::new("n", "renew"),
      ShortcutInfo::new("d", "deactivate"),
      ShortcutInfo::new("c", "clear history"),
    ]
  }
}
