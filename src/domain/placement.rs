//! Nudge-and-verify window placement
//!
//! Windows that are not per-monitor DPI aware have their coordinates silently
//! rescaled by the OS, so one positioning call cannot be trusted to land
//! exactly. The engine measures the invisible borders, applies a first logical
//! rectangle, re-measures the visual frame and, if it missed, applies one
//! scale-corrected rectangle. It never runs more than two passes.
//!
//! All measurements are physical pixels. Logical values stay inside this module.

use crate::domain::core::{Rect, RectDelta};

/// Denominators smaller than this (in pixels) are treated as unusable
const MIN_DENOMINATOR: f64 = 1.0;
/// Scale factors closer to 1.0 than this are measurement noise
const SCALE_SNAP_TOLERANCE: f64 = 0.01;
/// Upper bound on positioning calls per placement
pub const MAX_PASSES: u8 = 2;

/// Delta between a window's outer rectangle and its visual frame
///
/// `offset_x`/`offset_y` are how far the visual frame sits inside the outer
/// rectangle; `offset_width`/`offset_height` are how much larger the outer
/// rectangle is in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowBorders {
    pub offset_x: i32,
    pub offset_y: i32,
    pub offset_width: i32,
    pub offset_height: i32,
}

impl WindowBorders {
    pub const ZERO: Self = Self {
        offset_x: 0,
        offset_y: 0,
        offset_width: 0,
        offset_height: 0,
    };

    /// Derives the borders from an outer rectangle and its visual frame
    pub fn measure(outer: Rect, visual: Rect) -> Self {
        Self {
            offset_x: visual.x - outer.x,
            offset_y: visual.y - outer.y,
            offset_width: outer.w - visual.w,
            offset_height: outer.h - visual.h,
        }
    }

    /// Outer rectangle whose visual frame would be `visual` at scale 1.0
    pub fn expand(&self, visual: Rect) -> Rect {
        Rect::new(
            visual.x - self.offset_x,
            visual.y - self.offset_y,
            visual.w + self.offset_width,
            visual.h + self.offset_height,
        )
    }
}

/// A window the engine can measure and move
///
/// Implementations must report physical pixels from both measurement calls.
/// `apply_outer_rect` takes whatever coordinates the host positioning call
/// accepts, which may be virtualized.
pub trait FrameSurface {
    type Error: std::fmt::Display;

    /// Outer (non-client inclusive) rectangle
    fn outer_rect(&self) -> Result<Rect, Self::Error>;

    /// Visually rendered frame
    fn visual_frame(&self) -> Result<Rect, Self::Error>;

    /// Positions the window's outer rectangle
    fn apply_outer_rect(&mut self, rect: Rect) -> Result<(), Self::Error>;
}

/// Errors surfaced by [`place`]
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("Positioning call failed on pass {pass}: {message}")]
    ApplyFailed { pass: u8, message: String },
}

/// What a placement run did
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementReport {
    /// Physical rectangle the visual frame was asked to match
    pub target: Rect,
    /// Borders measured before the first pass
    pub borders: WindowBorders,
    /// Logical rectangles handed to the positioning call, in order
    pub applied: Vec<Rect>,
    /// Effective per-axis scale used by the correction pass
    pub scale: Option<(f64, f64)>,
    /// Visual frame minus target after the last pass, when it could be measured
    pub residual: Option<RectDelta>,
}

impl PlacementReport {
    pub fn passes(&self) -> usize {
        self.applied.len()
    }

    /// True when the final visual frame matched the target exactly
    pub fn converged(&self) -> bool {
        self.residual.is_some_and(|r| r.is_zero())
    }
}

/// Applies `target` to `surface` so its visual frame matches it
///
/// Border measurement failures degrade to zero borders. Re-measurement
/// failures after a pass end the run with an unknown residual. Only a failed
/// positioning call is an error.
pub fn place<S: FrameSurface>(surface: &mut S, target: Rect) -> Result<PlacementReport, PlacementError> {
    let borders = match measure_borders(surface) {
        Ok(borders) => borders,
        Err(message) => {
            tracing::warn!("Border measurement failed, using zero offsets: {message}");
            WindowBorders::ZERO
        }
    };

    let mut report = PlacementReport {
        target,
        borders,
        applied: Vec::with_capacity(MAX_PASSES as usize),
        scale: None,
        residual: None,
    };

    // Pass 1
    let first = borders.expand(target);
    apply(surface, first, 1)?;
    report.applied.push(first);

    let achieved = match surface.visual_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Could not re-measure visual frame after pass 1: {e}");
            return Ok(report);
        }
    };
    let error = achieved.delta(&target);
    report.residual = Some(error);
    if error.is_zero() {
        tracing::debug!(?target, "Placement converged after pass 1");
        return Ok(report);
    }

    // Pass 2
    let scale_x = effective_scale(achieved.w + borders.offset_width, first.w);
    let scale_y = effective_scale(achieved.h + borders.offset_height, first.h);
    report.scale = Some((scale_x, scale_y));

    let second = corrected_rect(first, target, borders, error, (scale_x, scale_y));
    tracing::debug!(
        ?target,
        ?error,
        scale_x,
        scale_y,
        ?second,
        "Placement missed on pass 1, applying correction"
    );
    apply(surface, second, 2)?;
    report.applied.push(second);

    report.residual = match surface.visual_frame() {
        Ok(frame) => Some(frame.delta(&target)),
        Err(e) => {
            tracing::warn!("Could not re-measure visual frame after pass 2: {e}");
            None
        }
    };

    Ok(report)
}

fn measure_borders<S: FrameSurface>(surface: &S) -> Result<WindowBorders, String> {
    let outer = surface.outer_rect().map_err(|e| e.to_string())?;
    let visual = surface.visual_frame().map_err(|e| e.to_string())?;
    if outer.is_degenerate() || visual.is_degenerate() {
        return Err(format!("degenerate rectangles outer={outer:?} visual={visual:?}"));
    }
    Ok(WindowBorders::measure(outer, visual))
}

fn apply<S: FrameSurface>(surface: &mut S, rect: Rect, pass: u8) -> Result<(), PlacementError> {
    surface
        .apply_outer_rect(rect)
        .map_err(|e| PlacementError::ApplyFailed {
            pass,
            message: e.to_string(),
        })
}

/// Ratio of achieved physical extent to requested logical extent
pub fn effective_scale(achieved: i32, requested: i32) -> f64 {
    let requested = requested as f64;
    if requested.abs() < MIN_DENOMINATOR {
        return 1.0;
    }
    let scale = achieved as f64 / requested;
    if !scale.is_finite() || scale.abs() < SCALE_SNAP_TOLERANCE {
        return 1.0;
    }
    if (scale - 1.0).abs() < SCALE_SNAP_TOLERANCE {
        1.0
    } else {
        scale
    }
}

/// Logical rectangle for the correction pass
fn corrected_rect(first: Rect, target: Rect, borders: WindowBorders, error: RectDelta, scale: (f64, f64)) -> Rect {
    let (scale_x, scale_y) = scale;
    let w = ((target.w + borders.offset_width) as f64 / scale_x).round() as i32;
    let h = ((target.h + borders.offset_height) as f64 / scale_y).round() as i32;
    let x = first.x - (error.dx as f64 / scale_x).round() as i32;
    let y = first.y - (error.dy as f64 / scale_y).round() as i32;
    Rect::new(x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Point;

    /// Window whose positioning call is rescaled around a monitor origin
    struct SimulatedWindow {
        scale: f64,
        origin: Point,
        borders: WindowBorders,
        outer: Rect,
        calls: Vec<Rect>,
        fail_measure: bool,
    }

    impl SimulatedWindow {
        fn new(scale: f64) -> Self {
            let borders = WindowBorders {
                offset_x: 7,
                offset_y: 0,
                offset_width: 14,
                offset_height: 7,
            };
            Self {
                scale,
                origin: Point::new(0, 0),
                borders,
                outer: Rect::new(100, 100, 814, 607),
                calls: Vec::new(),
                fail_measure: false,
            }
        }

        fn visual(&self) -> Rect {
            Rect::new(
                self.outer.x + self.borders.offset_x,
                self.outer.y + self.borders.offset_y,
                self.outer.w - self.borders.offset_width,
                self.outer.h - self.borders.offset_height,
            )
        }
    }

    impl FrameSurface for SimulatedWindow {
        type Error = String;

        fn outer_rect(&self) -> Result<Rect, String> {
            if self.fail_measure {
                return Err("no frame".into());
            }
            Ok(self.outer)
        }

        fn visual_frame(&self) -> Result<Rect, String> {
            if self.fail_measure {
                return Err("no frame".into());
            }
            Ok(self.visual())
        }

        fn apply_outer_rect(&mut self, rect: Rect) -> Result<(), String> {
            self.calls.push(rect);
            let s = self.scale;
            self.outer = Rect::new(
                self.origin.x + ((rect.x - self.origin.x) as f64 * s).round() as i32,
                self.origin.y + ((rect.y - self.origin.y) as f64 * s).round() as i32,
                (rect.w as f64 * s).round() as i32,
                (rect.h as f64 * s).round() as i32,
            );
            Ok(())
        }
    }

    #[test]
    fn borders_measure_and_expand() {
        let outer = Rect::new(633, -7, 1294, 1094);
        let visual = Rect::new(640, 0, 1280, 1087);
        let borders = WindowBorders::measure(outer, visual);
        assert_eq!(
            borders,
            WindowBorders {
                offset_x: 7,
                offset_y: 7,
                offset_width: 14,
                offset_height: 7
            }
        );
        assert_eq!(borders.expand(visual), outer);
    }

    #[test]
    fn per_monitor_aware_window_converges_in_one_pass() {
        let mut window = SimulatedWindow::new(1.0);
        let target = Rect::new(640, 0, 1280, 1080);
        let report = place(&mut window, target).unwrap();

        assert_eq!(report.passes(), 1);
        assert!(report.converged());
        assert_eq!(window.visual(), target);
        assert_eq!(window.calls, vec![Rect::new(633, 0, 1294, 1087)]);
    }

    #[test]
    fn virtualized_window_at_double_scale_converges_on_pass_two() {
        let mut window = SimulatedWindow::new(2.0);
        let target = Rect::new(647, 0, 1280, 1081);
        let report = place(&mut window, target).unwrap();

        assert_eq!(report.passes(), 2);
        assert_eq!(report.scale, Some((2.0, 2.0)));
        assert!(report.converged(), "residual {:?}", report.residual);
        assert_eq!(window.visual(), target);
    }

    #[test]
    fn virtualized_window_at_one_and_a_half_converges_on_pass_two() {
        let mut window = SimulatedWindow::new(1.5);
        // Chosen so every corrected logical value is integral at 1.5x
        let target = Rect::new(307, 0, 1270, 1073);
        let report = place(&mut window, target).unwrap();

        assert_eq!(report.passes(), 2);
        assert!(report.converged(), "residual {:?}", report.residual);
        assert_eq!(window.visual(), target);
    }

    #[test]
    fn downscaled_window_converges_on_pass_two() {
        let mut window = SimulatedWindow::new(0.5);
        let target = Rect::new(1927, 200, 1266, 993);
        let report = place(&mut window, target).unwrap();

        assert_eq!(report.passes(), 2);
        assert!(report.converged(), "residual {:?}", report.residual);
    }

    #[test]
    fn measurement_failure_falls_back_to_zero_borders() {
        let mut window = SimulatedWindow::new(1.0);
        window.fail_measure = true;
        let target = Rect::new(0, 0, 960, 540);
        let report = place(&mut window, target).unwrap();

        assert_eq!(report.borders, WindowBorders::ZERO);
        assert_eq!(report.passes(), 1);
        assert_eq!(report.residual, None);
        assert_eq!(window.calls, vec![target]);
    }

    #[test]
    fn apply_failure_is_reported() {
        struct Stuck;
        impl FrameSurface for Stuck {
            type Error = &'static str;
            fn outer_rect(&self) -> Result<Rect, Self::Error> {
                Ok(Rect::new(0, 0, 100, 100))
            }
            fn visual_frame(&self) -> Result<Rect, Self::Error> {
                Ok(Rect::new(0, 0, 100, 100))
            }
            fn apply_outer_rect(&mut self, _rect: Rect) -> Result<(), Self::Error> {
                Err("access denied")
            }
        }

        let err = place(&mut Stuck, Rect::new(0, 0, 50, 50)).unwrap_err();
        assert!(matches!(err, PlacementError::ApplyFailed { pass: 1, .. }));
    }

    #[test]
    fn never_more_than_two_passes() {
        /// Window that refuses to shrink below 900px wide
        struct MinSize {
            outer: Rect,
            calls: usize,
        }
        impl FrameSurface for MinSize {
            type Error = String;
            fn outer_rect(&self) -> Result<Rect, String> {
                Ok(self.outer)
            }
            fn visual_frame(&self) -> Result<Rect, String> {
                Ok(self.outer)
            }
            fn apply_outer_rect(&mut self, rect: Rect) -> Result<(), String> {
                self.calls += 1;
                self.outer = Rect::new(rect.x, rect.y, rect.w.max(900), rect.h);
                Ok(())
            }
        }

        let mut window = MinSize {
            outer: Rect::new(0, 0, 1000, 800),
            calls: 0,
        };
        let report = place(&mut window, Rect::new(0, 0, 640, 540)).unwrap();
        assert_eq!(window.calls, 2);
        assert_eq!(report.passes(), 2);
        assert!(!report.converged());
    }

    #[test]
    fn scale_guards() {
        assert_eq!(effective_scale(100, 0), 1.0);
        assert_eq!(effective_scale(1005, 1000), 1.0);
        assert_eq!(effective_scale(995, 1000), 1.0);
        assert_eq!(effective_scale(1500, 1000), 1.5);
        assert_eq!(effective_scale(0, 1000), 1.0);
    }
}
