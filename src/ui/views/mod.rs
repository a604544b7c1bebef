mod control_panel;
mod dashboard;
mod generator;
mod module_admin;
mod validator;

pub use control_panel::ControlPanelView;
pub use dashboard::DashboardView;
pub use generator::GeneratorView;
pub use module_admin::ModuleAdminView;
pub use validator::ValidatorView;

use crate::context::AppContext;
use crate::event::Event;
use crate::nav::TabId;
use crate::ui::view::TabView;
use ratatui::prelude::*;

/// Build the view for `tab`
pub fn build(tab: TabId, ctx: &AppContext) -> Box<dyn TabView> {
  match tab {
    TabId::Dashboard => Box::new(DashboardView::new(ctx.clone())),
    TabId::Generate => Box::new(GeneratorView::new(ctx.clone())),
    TabId::Validate => Box::new(ValidatorView::new(ctx.clone())),
    TabId::Admin => Box::new(ModuleAdminView::new(ctx.clone())),
    TabId::Control => Box::new(ControlPanelView::new(ctx.clone())),
  }
}

/// Timer callback that asks the app to refresh `tab`
fn refresh_trigger(ctx: &AppContext, tab: TabId) -> impl FnMut() + Send + 'static {
  let events = ctx.events.clone();
  move || {
    let _ = events.send(Event::Refresh(tab));
  }
}

/// `label value` with the label dimmed
fn detail_line<'a>(label: &'a str, value: &str) -> Line<'a> {
  Line::from(vec![
    Span::styled(label, Style::default().fg(Color::DarkGray)),
    Span::raw(value.to_string()),
  ])
}
