use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::ui::renderfns::centered;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Field values in declaration order
  Submitted(Vec<String>),
  Cancelled,
}

#[derive(Debug, Clone)]
struct FormField {
  label: &'static str,
  input: TextInput,
}

/// Modal text form. Tab and arrows move between fields, Enter submits.
#[derive(Debug, Clone, Default)]
pub struct Form {
  active: bool,
  title: String,
  fields: Vec<FormField>,
  focus: usize,
}

impl Form {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open with `(label, initial value)` pairs
  pub fn show(&mut self, title: &str, fields: &[(&'static str, &str)]) {
    self.active = true;
    self.title = title.to_string();
    self.focus = 0;
    self.fields = fields
      .iter()
      .map(|&(label, value)| FormField {
        label,
        input: TextInput::with_value(value),
      })
      .collect();
  }

  pub fn hide(&mut self) {
    self.active = false;
    self.fields.clear();
  }

  pub fn values(&self) -> Vec<String> {
    self.fields.iter().map(|f| f.input.value().to_string()).collect()
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    let count = self.fields.len().max(1);
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % count;
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + count - 1) % count;
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focus) else {
      self.hide();
      return KeyResult::Event(FormEvent::Cancelled);
    };
    match field.input.handle_key(key) {
      InputResult::Submitted(_) => {
        let values = self.values();
        self.hide();
        KeyResult::Event(FormEvent::Submitted(values))
      }
      InputResult::Cancelled => {
        self.hide();
        KeyResult::Event(FormEvent::Cancelled)
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let label_width = self.fields.iter().map(|f| f.label.len()).max().unwrap_or(0) as u16;
    let width = (label_width + 44).min(area.width);
    let height = self.fields.len() as u16 + 4;
    let overlay = centered(area, width, height);
    frame.render_widget(Clear, overlay);

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focus;
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };
        let mut spans = vec![
          Span::styled(
            format!("{:>width$}: ", field.label, width = label_width as usize),
            label_style,
          ),
          Span::raw(field.input.value().to_string()),
        ];
        if focused {
          spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
      })
      .collect();
    lines.push(Line::default());
    lines.push(Line::from(" tab:next  enter:save  esc:cancel ").dark_gray());

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));
    frame.render_widget(Paragraph::new(lines).block(block), overlay);
  }
}
