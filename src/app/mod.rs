//! Application orchestration layer
//!
//! The pure gesture machine runs on the hook thread, sessions run on the UI
//! thread, and the controller wires the two together.

pub mod controller;
pub mod session;
pub mod state;

pub use controller::{AppController, AppError};
