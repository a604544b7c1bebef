use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone)]
pub enum CommandEvent {
  /// A known command was chosen
  Run(&'static Command),
  /// Enter on text that matches nothing
  Unknown(String),
  Cancelled,
}

/// `:` palette with ranked suggestions
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected = 0;
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Only call while active; activation is the app's job
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    let count = self.suggestions().len();
    match key.code {
      KeyCode::Esc => {
        self.close();
        KeyResult::Event(CommandEvent::Cancelled)
      }
      KeyCode::Enter => {
        let event = match self.suggestions().get(self.selected) {
          Some(cmd) => CommandEvent::Run(cmd),
          None => CommandEvent::Unknown(self.input.value().trim().to_string()),
        };
        self.close();
        KeyResult::Event(event)
      }
      KeyCode::Tab | KeyCode::Down => {
        if count > 0 {
          self.selected = (self.selected + 1) % count;
        }
        KeyResult::Handled
      }
      KeyCode::BackTab | KeyCode::Up => {
        if count > 0 {
          self.selected = (self.selected + count - 1) % count;
        }
        KeyResult::Handled
      }
      _ => {
        if self.input.handle_key(key) == InputResult::Consumed {
          self.selected = 0;
        }
        KeyResult::Handled
      }
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;
    let width = (area.width * 60 / 100).clamp(30.min(area.width), 64.min(area.width));
    let height = (3 + shown).min(area.height);
    let overlay = Rect::new(area.x + 1, area.y + 1, width.saturating_sub(1), height);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    if inner.height == 0 {
      return;
    }

    let [input_area, list_area] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);

    let line = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line), input_area);

    if suggestions.is_empty() || list_area.height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<13}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(self.selected));
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}
