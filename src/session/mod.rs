//! Call session lifecycle: the controller that keeps panel state consistent
//! with the backend's event stream, and the per-stream video adapter.

pub mod controller;
pub mod error;
pub mod mode;
#[cfg(test)]
pub mod testing;
pub mod video;

pub use controller::SessionController;
pub use mode::{Mode, PageType};
