pub mod overlay;
pub mod renderer;

pub use overlay::{LayeredOverlay, OverlayError, OverlaySurface};
