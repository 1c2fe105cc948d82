//! UI module for TUI rendering.

pub mod dashboard;

use crate::app::App;
use ratatui::Frame;

/// Render the dashboard view.
pub fn render(frame: &mut Frame, app: &App) {
    dashboard::render(frame, app);
}
