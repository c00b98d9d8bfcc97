//! Configuration for gridsnap
//!
//! Settings live in one JSON file. Gesture sessions only see them through
//! the [`SettingsStore`] trait, which hands out per-monitor grid profiles.

pub mod settings;

pub use settings::{JsonSettingsStore, MonitorProfile, Settings, SettingsError, SettingsStore};
