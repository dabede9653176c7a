//! Terminal control panel
//!
//! Ratatui front-end over the session controller.

mod app;
mod log_capture;
mod log_pane;
mod ui;

pub use app::{run, LaunchOptions};
pub use log_capture::LogBuffer;
