use crate::controllers::control_panel::LicenseStatus;
use crate::notifications::NotificationLevel;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Truncate to `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn license_status_color(status: LicenseStatus) -> Color {
  match status {
    LicenseStatus::Active => Color::Green,
    LicenseStatus::Inactive => Color::DarkGray,
    LicenseStatus::Expired => Color::Red,
  }
}

pub fn level_color(level: NotificationLevel) -> Color {
  match level {
    NotificationLevel::Info => Color::Cyan,
    NotificationLevel::Success => Color::Green,
    NotificationLevel::Warning => Color::Yellow,
    NotificationLevel::Error => Color::Red,
  }
}

/// A `width` x `height` rect centered in `area`, clipped to it
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}

/// Inline failure panel shown in place of a section's content
pub fn draw_error_panel(frame: &mut Frame, area: Rect, title: &str, error: &str) {
  let block = Block::default()
    .title(format!(" {} ", title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let text = vec![
    Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))),
    Line::default(),
    Line::from(vec![
      Span::raw("Press "),
      Span::styled("r", Style::default().fg(Color::Cyan).bold()),
      Span::raw(" to retry"),
    ]),
  ];
  frame.render_widget(
    Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
    area,
  );
}

/// Bordered placeholder for loading and empty states
pub fn draw_placeholder(frame: &mut Frame, area: Rect, title: &str, message: &str) {
  let block = Block::default()
    .title(format!(" {} ", title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));
  frame.render_widget(
    Paragraph::new(message.to_string())
      .block(block)
      .style(Style::default().fg(Color::DarkGray)),
    area,
  );
}
