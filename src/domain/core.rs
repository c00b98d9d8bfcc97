//! Core domain types and operations
//!
//! This module defines pure domain types that work exclusively with
//! physical pixels and have no knowledge of Win32 or DPI concepts.

/// Rectangle in physical pixel coordinates
///
/// This is the fundamental building block for all geometric calculations.
/// All coordinates are in physical pixels, already DPI-normalized by the platform layer.
/// Secondary monitors can sit at negative coordinates, so every field is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Creates a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Creates a rectangle from its four edges
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// Returns the right edge coordinate
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Returns the bottom edge coordinate
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Returns true if this rectangle contains the given point
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Returns the centre point, rounded towards the top-left
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Returns the same rectangle expressed relative to `origin`
    pub fn relative_to(&self, origin: Point) -> Rect {
        Rect::new(self.x - origin.x, self.y - origin.y, self.w, self.h)
    }

    /// Component-wise difference `self - other` as (dx, dy, dw, dh)
    pub fn delta(&self, other: &Rect) -> RectDelta {
        RectDelta {
            dx: self.x - other.x,
            dy: self.y - other.y,
            dw: self.w - other.w,
            dh: self.h - other.h,
        }
    }

    /// Returns true when either dimension is zero or negative
    pub fn is_degenerate(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Per-component difference between two rectangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectDelta {
    pub dx: i32,
    pub dy: i32,
    pub dw: i32,
    pub dh: i32,
}

impl RectDelta {
    /// True when all four components are zero
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0 && self.dw == 0 && self.dh == 0
    }
}

/// Screen point in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Opaque handle of a top-level host window
///
/// The pure layers never dereference it; the platform layer converts it
/// to and from the native handle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

impl WindowId {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
