use super::KeyResult;
use crate::ui::renderfns::centered;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent<A> {
  Confirmed(A),
  Cancelled,
}

/// Yes/no dialog carrying the action it guards.
#[derive(Debug, Clone)]
pub struct ConfirmDialog<A> {
  pending: Option<(String, A)>,
}

impl<A> Default for ConfirmDialog<A> {
  fn default() -> Self {
    Self { pending: None }
  }
}

impl<A> ConfirmDialog<A> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  pub fn show(&mut self, prompt: impl Into<String>, action: A) {
    self.pending = Some((prompt.into(), action));
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent<A>> {
    if self.pending.is_none() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => match self.pending.take() {
        Some((_, action)) => KeyResult::Event(ConfirmEvent::Confirmed(action)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
        self.pending = None;
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((prompt, _)) = &self.pending else {
      return;
    };

    let width = (prompt.chars().count() as u16 + 6).clamp(30, 70);
    let overlay = centered(area, width, 6);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(" Confirm ");
    let text = vec![
      Line::from(prompt.as_str()),
      Line::default(),
      Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Green).bold()),
        Span::raw(" yes   "),
        Span::styled("n", Style::default().fg(Color::Red).bold()),
        Span::raw(" no"),
      ]),
    ];
    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_confirm_returns_action() {
    let mut dialog = ConfirmDialog::new();
    dialog.show("Deactivate license 42?", 42);
    assert_eq!(dialog.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert_eq!(
      dialog.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed(42))
    );
    assert!(!dialog.is_active());
  }

  #[test]
  fn test_decline() {
    let mut dialog = ConfirmDialog::new();
    dialog.show("Delete?", "lab");
    assert_eq!(
      dialog.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(ConfirmEvent::Cancelled)
    );
    assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);
  }
}
