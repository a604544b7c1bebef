use super::{detail_line, refresh_trigger};
use crate::context::AppContext;
use crate::controllers::dashboard::{
  format_uptime, load_dashboard, DashboardSnapshot, ResponseSpeed, SystemStatus, CONSOLE_VERSION,
};
use crate::nav::TabId;
use crate::query::{Query, QueryState};
use crate::schedule::AutoRefresh;
use crate::ui::renderfns::{draw_error_panel, draw_placeholder};
use crate::ui::view::{ShortcutInfo, TabView, ViewAction};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

const QUICK_ACTIONS: &[(char, TabId, &str)] = &[
  ('g', TabId::Generate, "Issue a new license"),
  ('v', TabId::Validate, "Validate a license key"),
  ('a', TabId::Admin, "Manage modules and license types"),
  ('c', TabId::Control, "Review issued licenses"),
];

/// System overview with a periodic reload
pub struct DashboardView {
  ctx: AppContext,
  query: Query<DashboardSnapshot>,
  auto_refresh: AutoRefresh,
}

impl DashboardView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let query = Query::new(move || {
      let api = api.clone();
      async move { load_dashboard(api.as_ref()).await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      query,
      auto_refresh: AutoRefresh::new(),
    }
  }

  fn render_status(&self, frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot) {
    let status_color = match snapshot.status {
      SystemStatus::Online => Color::Green,
      SystemStatus::Offline => Color::Red,
    };
    let speed_color = match ResponseSpeed::classify(snapshot.response_time) {
      ResponseSpeed::Fast => Color::Green,
      ResponseSpeed::Moderate => Color::Yellow,
      ResponseSpeed::Slow => Color::Red,
    };
    let uptime = format_uptime(Utc::now() - self.ctx.started_at);

    let lines = vec![
      Line::from(vec![
        Span::styled("Status:        ", Style::default().fg(Color::DarkGray)),
        Span::styled(snapshot.status.label(), Style::default().fg(status_color).bold()),
      ]),
      Line::from(vec![
        Span::styled("Response time: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format!("{}ms", snapshot.response_time.as_millis()),
          Style::default().fg(speed_color),
        ),
      ]),
      detail_line(
        "Server time:   ",
        snapshot.server_time.as_deref().unwrap_or("-"),
      ),
      detail_line("Uptime:        ", &uptime),
      detail_line("Version:       ", CONSOLE_VERSION),
      detail_line("Server:        ", &self.ctx.config.server.url),
    ];

    let block = Block::default()
      .title(" System ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_catalog(&self, frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot) {
    let lines = vec![
      Line::from(vec![
        Span::styled("Modules:       ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          snapshot.module_count.to_string(),
          Style::default().fg(Color::Cyan).bold(),
        ),
      ]),
      detail_line("Categories:    ", &snapshot.categories.join(", ")),
      Line::default(),
      Line::from(vec![
        Span::styled("License types: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          snapshot.license_type_count.to_string(),
          Style::default().fg(Color::Cyan).bold(),
        ),
      ]),
      detail_line("               ", &snapshot.license_type_names.join(", ")),
    ];

    let block = Block::default()
      .title(" Catalog ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_actions(&self, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = QUICK_ACTIONS
      .iter()
      .map(|(key, tab, label)| {
        Line::from(vec![
          Span::styled(format!(" {} ", key), Style::default().fg(Color::Cyan).bold()),
          Span::styled(format!("{:<14}", tab.title()), Style::default().fg(Color::White)),
          Span::styled(*label, Style::default().fg(Color::DarkGray)),
        ])
      })
      .collect();

    let block = Block::default()
      .title(" Quick actions ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl TabView for DashboardView {
  fn tab(&self) -> TabId {
    TabId::Dashboard
  }

  fn init(&mut self) -> Result<()> {
    self.query.fetch();
    self.auto_refresh.start(
      self.ctx.config.refresh.dashboard(),
      refresh_trigger(&self.ctx, TabId::Dashboard),
    );
    Ok(())
  }

  fn deactivate(&mut self) {
    self.auto_refresh.stop();
  }

  fn refresh(&mut self) {
    self.query.refresh();
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn is_loading(&self) -> bool {
    self.query.is_loading()
  }

  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char(c) => QUICK_ACTIONS
        .iter()
        .find(|(k, _, _)| *k == c)
        .map(|(_, tab, _)| ViewAction::Navigate(*tab))
        .unwrap_or(ViewAction::Unhandled),
      _ => ViewAction::Unhandled,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = match self.query.state() {
      QueryState::Success(snapshot) => snapshot,
      QueryState::Error(e) => {
        draw_error_panel(frame, area, "Dashboard", e);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        draw_placeholder(frame, area, "Dashboard", "Loading dashboard...");
        return;
      }
    };

    let [top, actions] =
      Layout::vertical([Constraint::Min(8), Constraint::Length(6)]).areas(area);
    let [status, catalog] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(top);

    self.render_status(frame, status, snapshot);
    self.render_catalog(frame, catalog, snapshot);
    self.render_actions(frame, actions);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("r", "refresh").with_priority(1),
      ShortcutInfo::new("g/v/a/c", "jump"),
    ]
  }
}
