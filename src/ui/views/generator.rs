use super::detail_line;
use crate::context::AppContext;
use crate::controllers::generator::{export_license, load_catalog, GeneratorCatalog, LicenseForm};
use crate::hardware::hardware_info;
use crate::license::types::{display_date, IssuedLicense, LicenseType};
use crate::nav::TabId;
use crate::notifications::Notification;
use crate::query::{Pending, Query, QueryState};
use crate::ui::components::{Form, FormEvent, KeyResult, Picker, PickerEvent, PickerItem};
use crate::ui::renderfns::{draw_error_panel, draw_placeholder};
use crate::ui::view::{ShortcutInfo, TabView, ViewAction};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickTarget {
  LicenseType,
  Modules,
}

/// License issuing form
pub struct GeneratorView {
  ctx: AppContext,
  catalog: Query<GeneratorCatalog>,
  form: LicenseForm,
  issued: Option<IssuedLicense>,
  issuing: Option<Pending<IssuedLicense>>,
  client_form: Form,
  picker: Picker,
  picking: Option<PickTarget>,
}

impl GeneratorView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let catalog = Query::new(move || {
      let api = api.clone();
      async move { load_catalog(api.as_ref()).await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      catalog,
      form: LicenseForm::default(),
      issued: None,
      issuing: None,
      client_form: Form::new(),
      picker: Picker::new(),
      picking: None,
    }
  }

  fn license_types(&self) -> &[LicenseType] {
    self
      .catalog
      .data()
      .map(|c| c.license_types.as_slice())
      .unwrap_or(&[])
  }

  fn edit_client(&mut self) {
    self.client_form.show(
      "Client",
      &[
        ("Name", self.form.client_name.as_str()),
        ("Email", self.form.client_email.as_str()),
      ],
    );
  }

  fn pick_type(&mut self) {
    let items: Vec<PickerItem> = self
      .license_types()
      .iter()
      .map(|t| {
        let limit = match t.module_limit() {
          Some(max) => format!("up to {} modules", max),
          None => "unlimited modules".to_string(),
        };
        PickerItem::new(&t.name, &t.name).with_detail(limit)
      })
      .collect();
    if items.is_empty() {
      self.ctx.notify(Notification::warning("No license types loaded"));
      return;
    }
    let current = self.form.license_type.clone();
    self.picker.show_single("License type", items, current.as_deref());
    self.picking = Some(PickTarget::LicenseType);
  }

  fn pick_modules(&mut self) {
    let items: Vec<PickerItem> = self
      .catalog
      .data()
      .map(|c| c.modules.as_slice())
      .unwrap_or(&[])
      .iter()
      .map(|m| {
        PickerItem::new(&m.name, m.label())
          .with_detail(m.category.clone().unwrap_or_default())
      })
      .collect();
    if items.is_empty() {
      self.ctx.notify(Notification::warning("No modules loaded"));
      return;
    }
    self.picker.show_multi("Modules", items, &self.form.modules);
    self.picking = Some(PickTarget::Modules);
  }

  fn detect_hardware(&mut self, force: bool) {
    match hardware_info(&self.ctx.store, force, Utc::now()) {
      Ok(hardware) => {
        self.ctx.notify(Notification::success(format!(
          "Hardware detected for {}",
          hardware.hostname
        )));
        self.form.hardware = Some(hardware);
      }
      Err(e) => {
        warn!(error = %e, "hardware detection failed");
        self.ctx.notify(Notification::error(format!("Hardware detection failed: {}", e)));
      }
    }
  }

  fn generate(&mut self) {
    if self.issuing.is_some() {
      return;
    }
    let request = match self.form.validate(self.license_types()) {
      Ok(request) => request,
      Err(e) => {
        self.ctx.notify(Notification::error(e.to_string()));
        return;
      }
    };

    info!(client = %request.client_email, license_type = %request.license_type, "requesting license");
    let api = self.ctx.api.clone();
    self.issuing = Some(Pending::spawn(async move {
      api.request_license(&request).await.map_err(|e| e.to_string())
    }));
  }

  fn save_issued(&self) {
    let Some(issued) = &self.issued else {
      self.ctx.notify(Notification::info("Generate a license first"));
      return;
    };
    let dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
    match export_license(&dir, issued) {
      Ok(path) => self
        .ctx
        .notify(Notification::success(format!("Saved {}", path.display()))),
      Err(e) => self
        .ctx
        .notify(Notification::error(format!("Could not save license: {}", e))),
    }
  }

  fn clear(&mut self) {
    self.form = LicenseForm::default();
    self.issued = None;
  }

  fn apply_picked(&mut self, values: Vec<String>) {
    match self.picking.take() {
      Some(PickTarget::LicenseType) => {
        self.form.license_type = values.into_iter().next();
        if let Some(warning) = self.form.module_limit_warning(self.license_types()) {
          self.ctx.notify(Notification::warning(warning.to_string()));
        }
      }
      Some(PickTarget::Modules) => {
        self.form.modules = values;
        if let Some(warning) = self.form.module_limit_warning(self.license_types()) {
          self.ctx.notify(Notification::warning(warning.to_string()));
        }
      }
      None => {}
    }
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.client_form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(values)) => {
        let mut values = values.into_iter();
        self.form.client_name = values.next().unwrap_or_default();
        self.form.client_email = values.next().unwrap_or_default();
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Picked(values)) => {
        self.apply_picked(values);
        Some(ViewAction::None)
      }
      KeyResult::Event(PickerEvent::Cancelled) => {
        self.picking = None;
        Some(ViewAction::None)
      }
      KeyResult::Handled => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn render_form(&self, frame: &mut Frame, area: Rect) {
    let modules = if self.form.modules.is_empty() {
      "none".to_string()
    } else {
      format!("{} ({})", self.form.modules.len(), self.form.modules.join(", "))
    };
    let hardware = match &self.form.hardware {
      Some(hw) => format!("{} / {}", hw.hostname, hw.mac_address),
      None => "not detected (h)".to_string(),
    };

    let mut lines = vec![
      detail_line("Client:   ", or_dash(&self.form.client_name)),
      detail_line("Email:    ", or_dash(&self.form.client_email)),
      detail_line("Type:     ", self.form.license_type.as_deref().unwrap_or("-")),
      detail_line("Modules:  ", &modules),
      detail_line("Hardware: ", &hardware),
    ];
    if let Some(warning) = self.form.module_limit_warning(self.license_types()) {
      lines.push(Line::default());
      lines.push(Line::from(Span::styled(
        warning.to_string(),
        Style::default().fg(Color::Yellow),
      )));
    }
    if self.issuing.is_some() {
      lines.push(Line::default());
      lines.push(Line::from(Span::styled(
        "Requesting license...",
        Style::default().fg(Color::Yellow),
      )));
    }

    let block = Block::default()
      .title(" New license ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_issued(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Issued license ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let Some(issued) = &self.issued else {
      let hint = "Fill in the client (e), pick a type (t) and modules (m), detect the \
                  hardware (h), then generate (g).";
      frame.render_widget(
        Paragraph::new(hint)
          .block(block.border_style(Style::default().fg(Color::Blue)))
          .style(Style::default().fg(Color::DarkGray))
          .wrap(Wrap { trim: true }),
        area,
      );
      return;
    };

    let users = issued
      .max_users
      .map(|n| n.to_string())
      .unwrap_or_else(|| "-".to_string());
    let lines = vec![
      Line::from(vec![
        Span::styled("Key:      ", Style::default().fg(Color::DarkGray)),
        Span::styled(issued.license_key.clone(), Style::default().fg(Color::Cyan).bold()),
      ]),
      detail_line("Type:     ", issued.license_type.as_deref().unwrap_or("-")),
      detail_line("Expires:  ", &display_date(issued.expires_at.as_deref())),
      detail_line("Users:    ", &users),
      detail_line("Modules:  ", &issued.allowed_modules.join(", ")),
      Line::default(),
      Line::from(Span::styled("s: save as JSON", Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }
}

fn or_dash(value: &str) -> &str {
  if value.is_empty() {
    "-"
  } else {
    value
  }
}

impl TabView for GeneratorView {
  fn tab(&self) -> TabId {
    TabId::Generate
  }

  fn init(&mut self) -> Result<()> {
    self.catalog.fetch();
    Ok(())
  }

  fn refresh(&mut self) {
    self.catalog.refresh();
  }

  fn tick(&mut self) {
    self.catalog.poll();

    let Some(result) = self.issuing.as_mut().and_then(|p| p.poll()) else {
      return;
    };
    self.issuing = None;
    match result {
      Ok(issued) if issued.success => {
        info!(license_key = %issued.license_key, "license issued");
        self.ctx.notify(Notification::success(format!(
          "License {} generated",
          issued.license_key
        )));
        self.issued = Some(issued);
      }
      Ok(rejected) => {
        let reason = rejected
          .message
          .unwrap_or_else(|| "The server refused the request".to_string());
        self.ctx.notify(Notification::error(reason));
      }
      Err(e) => self
        .ctx
        .notify(Notification::error(format!("License request failed: {}", e))),
    }
  }

  fn is_loading(&self) -> bool {
    self.catalog.is_loading() || self.issuing.is_some()
  }

  fn is_capturing_input(&self) -> bool {
    self.client_form.is_active() || self.picker.is_active()
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(action) = self.handle_overlays(key) {
      return action;
    }

    match key.code {
      KeyCode::Char('e') => self.edit_client(),
      KeyCode::Char('t') => self.pick_type(),
      KeyCode::Char('m') => self.pick_modules(),
      KeyCode::Char('h') => self.detect_hardware(false),
      KeyCode::Char('H') => self.detect_hardware(true),
      KeyCode::Char('g') | KeyCode::Enter => self.generate(),
      KeyCode::Char('s') => self.save_issued(),
      KeyCode::Char('c') => self.clear(),
      KeyCode::Char('r') => self.catalog.refetch(),
      _ => return ViewAction::Unhandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    match self.catalog.state() {
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "Generate", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "Generate", "Loading license types and modules...");
        return;
      }
      QueryState::Success(_) => {}
    }

    let [form, issued] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
    self.render_form(frame, form);
    self.render_issued(frame, issued);

    self.client_form.render_overlay(frame, area);
    self.picker.render_overlay(frame, area);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("e", "client").with_priority(1),
      ShortcutInfo::new("t", "type").with_priority(2),
      ShortcutInfo::new("m", "modules").with_priority(3),
      ShortcutInfo::new("h", "hardware").with_priority(4),
      ShortcutInfo::new("g", "generate").with_priority(5),
      ShortcutInfo::new("s", "save"),
      ShortcutInfo::new("c", "clear"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::fake::FakeApi;
  use crate::notifications::NotificationLevel;
  use crate::ui::views::testing::{
    context, has_notice, key, notices, render_to_string, settle, type_text,
  };
  use serde_json::json;

  fn catalog() -> FakeApi {
    FakeApi::new()
      .reply(
        "license_types",
        json!([
          {"name": "basic", "max_modules": 1},
          {"name": "enterprise", "max_modules": -1}
        ]),
      )
      .reply(
        "modules",
        json!([
          {"name": "base", "display_name": "Base", "category": "core"},
          {"name": "lab", "display_name": "Laboratory", "category": "clinical"}
        ]),
      )
  }

  fn api() -> FakeApi {
    catalog().reply(
      "request_license",
      json!({
        "success": true,
        "license_key": "ABC-DEFG-HIJK-LMNO",
        "license_type": "enterprise",
        "expires_at": "2027-10-17T00:00:00",
        "max_users": 10,
        "allowed_modules": ["base", "lab"]
      }),
    )
  }

  #[tokio::test]
  async fn test_invalid_form_never_reaches_server() {
    let (ctx, mut events, api) = context(api());
    let mut view = GeneratorView::new(ctx);
    view.init().unwrap();
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('g')));
    settle(&mut view).await;

    assert_eq!(api.count("request_license"), 0);
    assert!(has_notice(
      &notices(&mut events),
      NotificationLevel::Error,
      "Client name is required"
    ));
  }

  #[tokio::test]
  async fn test_generate_through_form_and_pickers() {
    let (ctx, mut events, api) = context(api());
    let mut view = GeneratorView::new(ctx);
    view.init().unwrap();
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('e')));
    assert!(view.is_capturing_input());
    type_text(&mut view, "North Clinic");
    view.handle_key(key(KeyCode::Tab));
    type_text(&mut view, "it@north.example");
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.form.client_name, "North Clinic");

    view.handle_key(key(KeyCode::Char('t')));
    view.handle_key(key(KeyCode::Down));
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.form.license_type.as_deref(), Some("enterprise"));

    view.handle_key(key(KeyCode::Char('m')));
    view.handle_key(key(KeyCode::Char('a')));
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.form.modules, vec!["base".to_string(), "lab".to_string()]);

    view.handle_key(key(KeyCode::Char('h')));
    assert!(view.form.hardware.is_some());

    view.handle_key(key(KeyCode::Char('g')));
    settle(&mut view).await;

    assert_eq!(api.calls().last().unwrap(), "request_license it@north.example");
    assert_eq!(
      view.issued.as_ref().map(|i| i.license_key.as_str()),
      Some("ABC-DEFG-HIJK-LMNO")
    );
    assert!(has_notice(
      &notices(&mut events),
      NotificationLevel::Success,
      "ABC-DEFG-HIJK-LMNO"
    ));
    let screen = render_to_string(&mut view, 120, 20);
    assert!(screen.contains("ABC-DEFG-HIJK-LMNO"));
  }

  #[tokio::test]
  async fn test_module_limit_blocks_generate() {
    let (ctx, mut events, api) = context(api());
    let mut view = GeneratorView::new(ctx);
    view.init().unwrap();
    settle(&mut view).await;

    view.form = LicenseForm {
      client_name: "North".into(),
      client_email: "it@north.example".into(),
      license_type: Some("basic".into()),
      modules: vec!["base".into(), "lab".into()],
      hardware: None,
    };
    view.detect_hardware(false);
    view.handle_key(key(KeyCode::Char('g')));

    assert_eq!(api.count("request_license"), 0);
    assert!(has_notice(
      &notices(&mut events),
      NotificationLevel::Error,
      "at most 1 modules"
    ));
  }

  #[tokio::test]
  async fn test_rejected_request_keeps_form() {
    let api = catalog().reply("request_license", json!({"success": false, "message": "quota"}));
    let (ctx, mut events, _api) = context(api);
    let mut view = GeneratorView::new(ctx);
    view.init().unwrap();
    settle(&mut view).await;

    view.form = LicenseForm {
      client_name: "North".into(),
      client_email: "it@north.example".into(),
      license_type: Some("enterprise".into()),
      modules: vec!["base".into()],
      hardware: None,
    };
    view.detect_hardware(false);
    view.handle_key(key(KeyCode::Char('g')));
    settle(&mut view).await;

    assert!(view.issued.is_none());
    assert_eq!(view.form.client_name, "North");
    assert!(has_notice(&notices(&mut events), NotificationLevel::Error, "quota"));
  }
}
