use super::detail_line;
use crate::context::AppContext;
use crate::controllers::module_admin::{
  describe_duration, describe_module_limit, describe_price, filter_modules, load_catalog,
  load_license_types, remove_license_type, remove_module, AdminCatalog, LicenseTypeForm,
  ModuleForm,
};
use crate::license::types::{LicenseType, LicenseTypeDraft, Module, ModuleDraft, MutationResponse};
use crate::nav::TabId;
use crate::notifications::Notification;
use crate::query::{Pending, Query, QueryState};
use crate::ui::components::{
  ConfirmDialog, ConfirmEvent, Form, FormEvent, KeyResult, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{draw_error_panel, draw_placeholder, truncate};
use crate::ui::view::{ShortcutInfo, TabView, ViewAction};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
  Modules,
  LicenseTypes,
}

/// Which record the open form edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Editing {
  NewModule,
  Module(i64),
  NewType,
  Type(i64),
}

#[derive(Debug, Clone, PartialEq)]
enum AdminMutation {
  CreateModule(ModuleDraft),
  UpdateModule(i64, ModuleDraft),
  DeleteModule(i64),
  CreateType(LicenseTypeDraft),
  UpdateType(i64, LicenseTypeDraft),
  DeleteType(i64),
}

impl AdminMutation {
  fn done_message(&self) -> &'static str {
    match self {
      AdminMutation::CreateModule(_) => "Module created",
      AdminMutation::UpdateModule(..) => "Module updated",
      AdminMutation::DeleteModule(_) => "Module deleted",
      AdminMutation::CreateType(_) => "License type created",
      AdminMutation::UpdateType(..) => "License type updated",
      AdminMutation::DeleteType(_) => "License type deleted",
    }
  }
}

const MODULE_FIELDS: [&str; 8] = [
  "Technical name",
  "Display name",
  "Description",
  "Category",
  "Min level",
  "License prefix",
  "Author",
  "Version",
];

const TYPE_FIELDS: [&str; 6] = [
  "Name",
  "Description",
  "Max users",
  "Max modules",
  "Duration days",
  "Price",
];

fn module_form_values(form: &ModuleForm) -> [&str; 8] {
  [
    &form.name,
    &form.display_name,
    &form.description,
    &form.category,
    &form.min_license_level,
    &form.license_prefix,
    &form.author,
    &form.version,
  ]
}

fn module_form_from(values: Vec<String>) -> ModuleForm {
  let mut values = values.into_iter();
  let mut next = || values.next().unwrap_or_default();
  ModuleForm {
    name: next(),
    display_name: next(),
    description: next(),
    category: next(),
    min_license_level: next(),
    license_prefix: next(),
    author: next(),
    version: next(),
  }
}

fn type_form_values(form: &LicenseTypeForm) -> [&str; 6] {
  [
    &form.name,
    &form.description,
    &form.max_users,
    &form.max_modules,
    &form.duration_days,
    &form.price,
  ]
}

fn type_form_from(values: Vec<String>) -> LicenseTypeForm {
  let mut values = values.into_iter();
  let mut next = || values.next().unwrap_or_default();
  LicenseTypeForm {
    name: next(),
    description: next(),
    max_users: next(),
    max_modules: next(),
    duration_days: next(),
    price: next(),
  }
}

/// Module catalog and license-type administration
pub struct ModuleAdminView {
  ctx: AppContext,
  section: Section,
  catalog: Query<AdminCatalog>,
  types: Query<Vec<LicenseType>>,
  module_list: ListState,
  type_list: ListState,
  search: SearchInput,
  form: Form,
  editing: Option<Editing>,
  confirm: ConfirmDialog<AdminMutation>,
  mutation: Option<(AdminMutation, Pending<MutationResponse>)>,
}

impl ModuleAdminView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let catalog = Query::new(move || {
      let api = api.clone();
      async move { load_catalog(api.as_ref()).await.map_err(|e| e.to_string()) }
    });
    let api = ctx.api.clone();
    let types = Query::new(move || {
      let api = api.clone();
      async move { load_license_types(api.as_ref()).await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      section: Section::Modules,
      catalog,
      types,
      module_list: ListState::default(),
      type_list: ListState::default(),
      search: SearchInput::new("Filter modules"),
      form: Form::new(),
      editing: None,
      confirm: ConfirmDialog::new(),
      mutation: None,
    }
  }

  fn modules(&self) -> &[Module] {
    self
      .catalog
      .data()
      .map(|c| c.modules.as_slice())
      .unwrap_or(&[])
  }

  fn visible_modules(&self) -> Vec<&Module> {
    filter_modules(self.modules(), self.search.query())
  }

  fn license_types(&self) -> &[LicenseType] {
    self.types.data().map(|t| t.as_slice()).unwrap_or(&[])
  }

  fn selected_module(&self) -> Option<&Module> {
    let idx = self.module_list.selected()?;
    self.visible_modules().get(idx).copied()
  }

  fn selected_type(&self) -> Option<&LicenseType> {
    let idx = self.type_list.selected()?;
    self.license_types().get(idx)
  }

  fn open_module_form(&mut self, editing: Editing, form: &ModuleForm) {
    let fields: Vec<(&'static str, &str)> = MODULE_FIELDS
      .iter()
      .copied()
      .zip(module_form_values(form))
      .collect();
    let title = match editing {
      Editing::Module(_) => "Edit module",
      _ => "New module",
    };
    self.form.show(title, &fields);
    self.editing = Some(editing);
  }

  fn open_type_form(&mut self, editing: Editing, form: &LicenseTypeForm) {
    let fields: Vec<(&'static str, &str)> = TYPE_FIELDS
      .iter()
      .copied()
      .zip(type_form_values(form))
      .collect();
    let title = match editing {
      Editing::Type(_) => "Edit license type",
      _ => "New license type",
    };
    self.form.show(title, &fields);
    self.editing = Some(editing);
  }

  fn create(&mut self) {
    match self.section {
      Section::Modules => self.open_module_form(Editing::NewModule, &ModuleForm::default()),
      Section::LicenseTypes => {
        self.open_type_form(Editing::NewType, &LicenseTypeForm::default())
      }
    }
  }

  fn edit_selected(&mut self) {
    match self.section {
      Section::Modules => {
        let Some((id, form)) = self
          .selected_module()
          .and_then(|m| Some((m.id?, ModuleForm::for_edit(m))))
        else {
          return;
        };
        self.open_module_form(Editing::Module(id), &form);
      }
      Section::LicenseTypes => {
        let Some((id, form)) = self
          .selected_type()
          .and_then(|t| Some((t.id?, LicenseTypeForm::for_edit(t))))
        else {
          return;
        };
        self.open_type_form(Editing::Type(id), &form);
      }
    }
  }

  fn delete_selected(&mut self) {
    let request = match self.section {
      Section::Modules => self.selected_module().map(|m| {
        if m.is_core() {
          Err("Core modules cannot be deleted".to_string())
        } else {
          m.id
            .map(|id| {
              (
                format!("Delete module '{}'? This cannot be undone.", m.label()),
                AdminMutation::DeleteModule(id),
              )
            })
            .ok_or_else(|| "Module has no id".to_string())
        }
      }),
      Section::LicenseTypes => self.selected_type().map(|t| {
        t.id
          .map(|id| {
            (
              format!("Delete license type '{}'? This cannot be undone.", t.name),
              AdminMutation::DeleteType(id),
            )
          })
          .ok_or_else(|| "License type has no id".to_string())
      }),
    };

    match request {
      Some(Ok((prompt, mutation))) => self.confirm.show(prompt, mutation),
      Some(Err(reason)) => self.ctx.notify(Notification::warning(reason)),
      None => {}
    }
  }

  fn submit_form(&mut self, values: Vec<String>) {
    let Some(editing) = self.editing.take() else {
      return;
    };

    let mutation = match editing {
      Editing::NewModule | Editing::Module(_) => {
        let form = module_form_from(values);
        let draft = match editing {
          Editing::Module(id) => form
            .validate_edit(self.modules(), id)
            .map(|d| AdminMutation::UpdateModule(id, d)),
          _ => form.validate_new(self.modules()).map(AdminMutation::CreateModule),
        };
        match draft {
          Ok(mutation) => mutation,
          Err(e) => {
            self.ctx.notify(Notification::error(e.to_string()));
            self.open_module_form(editing, &form);
            return;
          }
        }
      }
      Editing::NewType | Editing::Type(_) => {
        let form = type_form_from(values);
        let draft = form.validate().map(|d| match editing {
          Editing::Type(id) => AdminMutation::UpdateType(id, d),
          _ => AdminMutation::CreateType(d),
        });
        match draft {
          Ok(mutation) => mutation,
          Err(e) => {
            self.ctx.notify(Notification::error(e.to_string()));
            self.open_type_form(editing, &form);
            return;
          }
        }
      }
    };
    self.run(mutation);
  }

  fn run(&mut self, mutation: AdminMutation) {
    if self.mutation.is_some() {
      self
        .ctx
        .notify(Notification::info("Another change is still in progress"));
      return;
    }
    info!(mutation = ?mutation, "admin change");

    let api = self.ctx.api.clone();
    let task = mutation.clone();
    let pending = Pending::spawn(async move {
      let response = match &task {
        AdminMutation::CreateModule(draft) => api.create_module(draft).await,
        AdminMutation::UpdateModule(id, draft) => api.update_module(*id, draft).await,
        AdminMutation::DeleteModule(id) => api.delete_module(*id).await,
        AdminMutation::CreateType(draft) => api.create_license_type(draft).await,
        AdminMutation::UpdateType(id, draft) => api.update_license_type(*id, draft).await,
        AdminMutation::DeleteType(id) => api.delete_license_type(*id).await,
      };
      response.map_err(|e| e.to_string())
    });
    self.mutation = Some((mutation, pending));
  }

  fn poll_mutation(&mut self) {
    let Some(result) = self.mutation.as_mut().and_then(|(_, p)| p.poll()) else {
      return;
    };
    let Some((mutation, _)) = self.mutation.take() else {
      return;
    };

    match result {
      Ok(response) if response.success => {
        self
          .ctx
          .notify(Notification::success(response.message_or(mutation.done_message())));
        match mutation {
          AdminMutation::DeleteModule(id) => {
            if let Some(catalog) = self.catalog.data_mut() {
              remove_module(&mut catalog.modules, id);
            }
          }
          AdminMutation::DeleteType(id) => {
            if let Some(types) = self.types.data_mut() {
              remove_license_type(types, id);
            }
          }
          AdminMutation::CreateModule(_) | AdminMutation::UpdateModule(..) => {
            self.catalog.refresh()
          }
          AdminMutation::CreateType(_) | AdminMutation::UpdateType(..) => self.types.refresh(),
        }
      }
      Ok(response) => self.ctx.notify(Notification::error(
        response.message_or("The server refused the change"),
      )),
      Err(e) => self
        .ctx
        .notify(Notification::error(format!("Change failed: {}", e))),
    }
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(values)) => {
        self.submit_form(values);
        return Some(ViewAction::None);
      }
      KeyResult::Event(FormEvent::Cancelled) => {
        self.editing = None;
        return Some(ViewAction::None);
      }
      KeyResult::Handled => return Some(ViewAction::None),
      KeyResult::NotHandled => {}
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(mutation)) => {
        self.run(mutation);
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
      _ => return Some(ViewAction::None),
    }

    if self.section == Section::Modules {
      match self.search.handle_key(key) {
        KeyResult::Event(SearchEvent::Changed(_)) => {
          self.module_list.select(Some(0));
          return Some(ViewAction::None);
        }
        KeyResult::NotHandled => {}
        _ => return Some(ViewAction::None),
      }
    }
    None
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect, catalog: &AdminCatalog) {
    let stats = &catalog.stats;
    let stat = |label: &'static str, value: i64| {
      vec![
        Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value.to_string(), Style::default().fg(Color::Cyan).bold()),
        Span::raw("  "),
      ]
    };
    let mut spans = Vec::new();
    spans.extend(stat("Modules", stats.total_modules));
    spans.extend(stat("Core", stats.core_modules));
    spans.extend(stat("Custom", stats.custom_modules));
    spans.extend(stat("Licenses", stats.total_licenses));
    spans.extend(stat("Active", stats.active_licenses));
    spans.extend(stat("License types", self.license_types().len() as i64));

    let lines = vec![
      Line::from(spans),
      detail_line(" Categories ", &catalog.categories.join(", ")),
    ];
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_modules(&mut self, frame: &mut Frame, area: Rect) {
    let [list_area, detail_area] =
      Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);

    let items: Vec<ListItem> = self
      .visible_modules()
      .iter()
      .map(|m| {
        let (badge, color) = if m.is_core() {
          ("CORE  ", Color::Green)
        } else {
          ("CUSTOM", Color::Blue)
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} ", badge), Style::default().fg(color)),
          Span::styled(
            format!("{:<20}", truncate(m.label(), 20)),
            Style::default().fg(Color::White),
          ),
          Span::styled(format!(" {:<16}", truncate(&m.name, 16)), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!(" {}", m.category.as_deref().unwrap_or("-")),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    ensure_valid_selection(&mut self.module_list, items.len());

    let title = if self.search.query().is_empty() {
      format!(" Modules ({}) ", items.len())
    } else {
      format!(" Modules ({}) /{} ", items.len(), self.search.query())
    };
    let list = List::new(items)
      .block(
        Block::default()
          .title(title)
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      )
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut self.module_list);

    let block = Block::default()
      .title(" Details ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let lines = match self.selected_module() {
      Some(m) => {
        let prefix = m
          .extra
          .get("license_prefix")
          .and_then(|v| v.as_str())
          .unwrap_or("-");
        vec![
          detail_line("Name:        ", &m.name),
          detail_line("Display:     ", m.label()),
          detail_line("Category:    ", m.category.as_deref().unwrap_or("-")),
          detail_line("Version:     ", m.version.as_deref().unwrap_or("-")),
          detail_line("Min level:   ", m.min_license_level.as_deref().unwrap_or("-")),
          detail_line("Prefix:      ", prefix),
          detail_line("Author:      ", m.author.as_deref().unwrap_or("-")),
          Line::default(),
          Line::from(m.description.clone().unwrap_or_default()),
        ]
      }
      None => vec![Line::from("No module selected").dark_gray()],
    };
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      detail_area,
    );
  }

  fn render_types(&mut self, frame: &mut Frame, area: Rect) {
    match self.types.state() {
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "License types", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "License types", "Loading license types...");
        return;
      }
      QueryState::Success(_) => {}
    }

    let items: Vec<ListItem> = self
      .license_types()
      .iter()
      .map(|t| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<18}", truncate(&t.name, 18)), Style::default().fg(Color::Cyan)),
          Span::raw(format!(
            " users {:<6}",
            t.max_users.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
          )),
          Span::raw(format!(" modules {:<10}", describe_module_limit(t.max_modules))),
          Span::raw(format!(" {:<10}", describe_duration(t.duration_days))),
          Span::styled(
            format!(" {}", describe_price(t.price)),
            Style::default().fg(Color::Green),
          ),
        ]))
      })
      .collect();
    ensure_valid_selection(&mut self.type_list, items.len());

    let list = List::new(items)
      .block(
        Block::default()
          .title(format!(" License types ({}) ", self.license_types().len()))
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      )
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.type_list);
  }
}

impl TabView for ModuleAdminView {
  fn tab(&self) -> TabId {
    TabId::Admin
  }

  fn init(&mut self) -> Result<()> {
    self.catalog.fetch();
    self.types.fetch();
    Ok(())
  }

  fn refresh(&mut self) {
    self.catalog.refresh();
    self.types.refresh();
  }

  fn tick(&mut self) {
    self.catalog.poll();
    self.types.poll();
    self.poll_mutation();
  }

  fn is_loading(&self) -> bool {
    self.catalog.is_loading() || self.types.is_loading() || self.mutation.is_some()
  }

  fn is_capturing_input(&self) -> bool {
    self.form.is_active() || self.confirm.is_active() || self.search.is_active()
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(action) = self.handle_overlays(key) {
      return action;
    }

    let list = match self.section {
      Section::Modules => &mut self.module_list,
      Section::LicenseTypes => &mut self.type_list,
    };
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => list.select_next(),
      KeyCode::Char('k') | KeyCode::Up => list.select_previous(),
      KeyCode::Tab => {
        self.section = match self.section {
          Section::Modules => Section::LicenseTypes,
          Section::LicenseTypes => Section::Modules,
        };
      }
      KeyCode::Char('n') => self.create(),
      KeyCode::Char('e') | KeyCode::Enter => self.edit_selected(),
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('r') => {
        self.catalog.refetch();
        self.types.refetch();
      }
      _ => return ViewAction::Unhandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let catalog = match self.catalog.state() {
      QueryState::Success(catalog) => catalog.clone(),
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "Admin", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "Admin", "Loading modules...");
        return;
      }
    };

    let [stats, body] = Layout::vertical([Constraint::Length(4), Constraint::Min(3)]).areas(area);
    self.render_stats(frame, stats, &catalog);
    match self.section {
      Section::Modules => self.render_modules(frame, body),
      Section::LicenseTypes => self.render_types(frame, body),
    }

    self.search.render_overlay(frame, area);
    self.form.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new("tab", "section").with_priority(1),
      ShortcutInfo::new("n", "new").with_priority(2),
      ShortcutInfo::new("e", "edit").with_priority(3),
      ShortcutInfo::new("d", "delete").with_priority(4),
    ];
    if self.section == Section::Modules {
      shortcuts.push(ShortcutInfo::new("/", "filter"));
    }
    shortcuts
  }
}
