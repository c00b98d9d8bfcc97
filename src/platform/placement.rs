//! Host side of window placement
//!
//! Runs the nudge-and-verify engine against a real window with the calling
//! thread switched to per-monitor-v2 DPI awareness for the whole run.

use crate::domain::core::{Rect, WindowId};
use crate::domain::placement::{PlacementError, PlacementReport, place};
use crate::platform::dpi::DpiAwarenessScope;
use crate::platform::window::Win32Window;

/// Moves windows so their visual frame matches a physical rectangle
pub trait WindowPlacer {
    fn place(&mut self, window: WindowId, target: Rect) -> Result<PlacementReport, PlacementError>;
}

/// [`WindowPlacer`] for live top-level windows
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Placer;

impl WindowPlacer for Win32Placer {
    fn place(&mut self, window: WindowId, target: Rect) -> Result<PlacementReport, PlacementError> {
        let _dpi = DpiAwarenessScope::per_monitor_v2();
        let mut surface = Win32Window::new(window);
        let report = place(&mut surface, target)?;

        if report.converged() {
            tracing::debug!(%window, ?target, passes = report.passes(), "Window placed");
        } else {
            tracing::info!(
                %window,
                ?target,
                passes = report.passes(),
                residual = ?report.residual,
                "Window placed with residual error"
            );
        }
        Ok(report)
    }
}
