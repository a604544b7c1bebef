use super::KeyResult;
use crate::ui::renderfns::centered;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
  pub value: String,
  pub label: String,
  pub detail: Option<String>,
}

impl PickerItem {
  pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      value: value.into(),
      label: label.into(),
      detail: None,
    }
  }

  pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = Some(detail.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
  /// Chosen values; always one value in single mode
  Picked(Vec<String>),
  Cancelled,
}

/// Centered list overlay for picking one value, or several with space.
#[derive(Debug, Clone, Default)]
pub struct Picker {
  active: bool,
  multi: bool,
  title: String,
  items: Vec<PickerItem>,
  cursor: usize,
  chosen: BTreeSet<usize>,
}

impl Picker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Single choice, cursor on `current` if present
  pub fn show_single(&mut self, title: &str, items: Vec<PickerItem>, current: Option<&str>) {
    self.open(title, items, false);
    if let Some(idx) = current.and_then(|c| self.items.iter().position(|i| i.value == c)) {
      self.cursor = idx;
    }
  }

  /// Several choices, with `current` pre-checked and the cursor on the first of them
  pub fn show_multi(&mut self, title: &str, items: Vec<PickerItem>, current: &[String]) {
    self.open(title, items, true);
    self.chosen = self
      .items
      .iter()
      .enumerate()
      .filter(|(_, item)| current.contains(&item.value))
      .map(|(i, _)| i)
      .collect();
    if let Some(&first) = self.chosen.first() {
      self.cursor = first;
    }
  }

  fn open(&mut self, title: &str, items: Vec<PickerItem>, multi: bool) {
    self.active = true;
    self.multi = multi;
    self.title = title.to_string();
    self.items = items;
    self.cursor = 0;
    self.chosen.clear();
  }

  pub fn hide(&mut self) {
    self.active = false;
    self.items.clear();
    self.chosen.clear();
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    let len = self.items.len();
    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(PickerEvent::Cancelled)
      }
      KeyCode::Char('j') | KeyCode::Down if len > 0 => {
        self.cursor = (self.cursor + 1) % len;
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up if len > 0 => {
        self.cursor = (self.cursor + len - 1) % len;
        KeyResult::Handled
      }
      KeyCode::Char(' ') if self.multi && len > 0 => {
        if !self.chosen.remove(&self.cursor) {
          self.chosen.insert(self.cursor);
        }
        KeyResult::Handled
      }
      KeyCode::Char('a') if self.multi => {
        if self.chosen.len() == len {
          self.chosen.clear();
        } else {
          self.chosen = (0..len).collect();
        }
        KeyResult::Handled
      }
      KeyCode::Enter => {
        let picked: Vec<String> = if self.multi {
          self
            .chosen
            .iter()
            .filter_map(|&i| self.items.get(i))
            .map(|item| item.value.clone())
            .collect()
        } else {
          self
            .items
            .get(self.cursor)
            .map(|item| vec![item.value.clone()])
            .unwrap_or_default()
        };
        self.hide();
        if picked.is_empty() && !self.multi {
          KeyResult::Event(PickerEvent::Cancelled)
        } else {
          KeyResult::Event(PickerEvent::Picked(picked))
        }
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let widest = self
      .items
      .iter()
      .map(|i| i.label.chars().count() + i.detail.as_ref().map_or(0, |d| d.chars().count() + 2))
      .max()
      .unwrap_or(10)
      .max(self.title.chars().count());
    let width = (widest as u16 + 10).max(24);
    let height = self.items.len() as u16 + 2 + u16::from(self.multi);
    let overlay = centered(area, width, height);
    frame.render_widget(Clear, overlay);

    let mut block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));
    if self.multi {
      block = block.title_bottom(Line::from(" space:toggle a:all enter:done ").dark_gray());
    }

    let items: Vec<ListItem> = self
      .items
      .iter()
      .enumerate()
      .map(|(i, item)| {
        let mut spans = Vec::new();
        if self.multi {
          let mark = if self.chosen.contains(&i) { "[x] " } else { "[ ] " };
          spans.push(Span::styled(mark, Style::default().fg(Color::Green)));
        }
        spans.push(Span::styled(item.label.clone(), Style::default().fg(Color::Cyan)));
        if let Some(detail) = &item.detail {
          spans.push(Span::styled(format!("  {}", detail), Style::default().fg(Color::DarkGray)));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(self.cursor));
    frame.render_stateful_widget(list, overlay, &mut state);
  }
}
