pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header, body, footer] = Layout::vertical([
    Constraint::Length(2), // Title, tabs and shortcuts
    Constraint::Min(1),    // Active tab
    Constraint::Length(1), // Notifications
  ])
  .areas(frame.area());

  let shortcuts = app.router().view().map(|v| v.shortcuts()).unwrap_or_default();
  let loading = app.router().is_loading().then_some(app.spinner_frame());
  renderfns::draw_header(
    frame,
    header,
    app.title(),
    app.router().active(),
    loading,
    &shortcuts,
  );

  app.router_mut().render(frame, body);

  let notices = app.notifications();
  renderfns::draw_footer(frame, footer, notices.latest(), notices.len());

  app.command().render_overlay(frame, frame.area());
}

/// Clamp a list selection after the list changed length
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_selection_clamped() {
    let mut state = ListState::default().with_selected(Some(7));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);

    ensure_valid_selection(&mut state, 4);
    assert_eq!(state.selected(), Some(0));
  }
}
