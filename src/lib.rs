//! Snap a dragged window to a per-monitor grid
//!
//! While a window is being dragged, a right click (or a configured trigger
//! key) cancels the native move, shows a grid over the monitor and places the
//! window over whatever cells the pointer sweeps across.

pub mod app;
pub mod config;
pub mod domain;
pub mod input;
pub mod platform;
pub mod ui;
