//! Domain logic and core data structures
//!
//! This module contains pure business logic that is independent
//! of Win32 APIs and platform-specific implementations.

pub mod core;
pub mod grid;
pub mod placement;
pub mod selection;
