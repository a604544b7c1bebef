pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use utils::{
  centered, draw_error_panel, draw_placeholder, level_color, license_status_color, truncate,
};
