use crate::nav::TabId;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Two header rows: title with the tab bar, then the active tab's shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  active: TabId,
  loading: Option<usize>,
  shortcuts: &[ShortcutInfo],
) {
  let [tabs_area, keys_area] =
    Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

  let mut spans = vec![
    Span::styled(" licdeck ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];
  spans.extend(tab_bar(active));
  if let Some(frame_no) = loading {
    spans.push(Span::styled(
      format!(" {} loading", spinner_frame(frame_no)),
      Style::default().fg(Color::Yellow),
    ));
  }
  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    tabs_area,
  );

  frame.render_widget(Paragraph::new(shortcut_line(shortcuts)), keys_area);
}

fn tab_bar(active: TabId) -> Vec<Span<'static>> {
  TabId::all()
    .iter()
    .flat_map(|tab| {
      let style = if *tab == active {
        Style::default().fg(Color::Black).bg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::Gray)
      };
      [
        Span::raw(" "),
        Span::styled(format!("{} {}", tab.hotkey(), tab.title()), style),
      ]
    })
    .collect()
}

fn shortcut_line(shortcuts: &[ShortcutInfo]) -> Line<'static> {
  let mut sorted = shortcuts.to_vec();
  sorted.sort_by_key(|s| s.priority);

  let mut spans = vec![Span::raw(" ")];
  for shortcut in sorted {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }
  Line::from(spans)
}

pub fn spinner_frame(n: usize) -> char {
  SPINNER[n % SPINNER.len()]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_spinner_wraps() {
    assert_eq!(spinner_frame(0), spinner_frame(SPINNER.len()));
  }

  #[test]
  fn test_shortcuts_sorted_by_priority() {
    let line = shortcut_line(&[
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new("g", "generate").with_priority(1),
    ]);
    assert_eq!(line.spans[1].content, "<g>");
    assert_eq!(line.spans[3].content, "<r>");
  }

  #[test]
  fn test_tab_bar_lists_every_tab() {
    let spans = tab_bar(TabId::Validate);
    assert_eq!(spans.len(), TabId::all().len() * 2);
    assert_eq!(spans[5].content, "3 Validate");
  }
}
