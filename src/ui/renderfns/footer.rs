use super::utils::level_color;
use crate::notifications::Notification;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

const HINTS: &str = " :command  1-5/[ ]:tabs  r:refresh  x:dismiss  q:quit";

/// Latest notification, or the global key hints
pub fn draw_footer(frame: &mut Frame, area: Rect, latest: Option<&Notification>, pending: usize) {
  let line = match latest {
    Some(notice) => {
      let color = level_color(notice.level);
      let mut spans = vec![
        Span::styled(" ● ", Style::default().fg(color)),
        Span::styled(notice.message.clone(), Style::default().fg(color)),
      ];
      if pending > 1 {
        spans.push(Span::styled(
          format!("  (+{} more, x to dismiss)", pending - 1),
          Style::default().fg(Color::DarkGray),
        ));
      }
      Line::from(spans)
    }
    None => Line::from(Span::styled(HINTS, Style::default().fg(Color::DarkGray))),
  };
  frame.render_widget(Paragraph::new(line), area);
}
