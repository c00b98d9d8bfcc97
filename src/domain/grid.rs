//! Grid geometry and cell calculations
//!
//! This module maps physical screen points to grid cells and grid cell spans
//! back to physical rectangles. A grid is always pinned to the monitor area it
//! was created for: points outside that area are clamped, never re-targeted to
//! another monitor's grid.

use crate::domain::core::{Point, Rect};

/// Errors that can occur during grid operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Grid dimensions are invalid (zero)
    #[error("Invalid grid dimensions: {columns} columns x {rows} rows")]
    InvalidDimensions { rows: u32, columns: u32 },
    /// The monitor area has no extent
    #[error("Cannot build a grid over an empty area {area:?}")]
    EmptyArea { area: Rect },
    /// Cell coordinates are outside the grid
    #[error("Cell {cell:?} is outside a {columns}x{rows} grid")]
    CellOutOfRange { cell: CellCoords, rows: u32, columns: u32 },
}

/// Grid coordinates of a single cell, column first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoords {
    pub col: u32,
    pub row: u32,
}

impl CellCoords {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

/// Inclusive rectangular range of cells, normalized so `top_left <= bottom_right`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellSpan {
    pub top_left: CellCoords,
    pub bottom_right: CellCoords,
}

impl CellSpan {
    /// Builds the span covering both cells, whatever order they come in
    pub fn between(a: CellCoords, b: CellCoords) -> Self {
        Self {
            top_left: CellCoords::new(a.col.min(b.col), a.row.min(b.row)),
            bottom_right: CellCoords::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Number of columns covered
    pub fn columns(&self) -> u32 {
        self.bottom_right.col - self.top_left.col + 1
    }

    /// Number of rows covered
    pub fn rows(&self) -> u32 {
        self.bottom_right.row - self.top_left.row + 1
    }
}

/// Row/column count of a monitor grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub rows: u32,
    pub columns: u32,
}

impl GridDimensions {
    pub fn new(rows: u32, columns: u32) -> Result<Self, GridError> {
        if rows == 0 || columns == 0 {
            return Err(GridError::InvalidDimensions { rows, columns });
        }
        Ok(Self { rows, columns })
    }
}

/// A grid laid over one monitor's physical working area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    area: Rect,
    dims: GridDimensions,
}

impl Grid {
    /// Creates a grid over `area`
    ///
    /// # Example
    /// ```rust
    /// use gridsnap_win::domain::{core::{Point, Rect}, grid::{CellCoords, Grid, GridDimensions}};
    ///
    /// let grid = Grid::new(Rect::new(0, 0, 1920, 1080), GridDimensions::new(2, 3).unwrap()).unwrap();
    /// assert_eq!(grid.point_to_cell(Point::new(700, 300)), CellCoords::new(1, 0));
    /// ```
    pub fn new(area: Rect, dims: GridDimensions) -> Result<Self, GridError> {
        if area.is_degenerate() {
            return Err(GridError::EmptyArea { area });
        }
        Ok(Self { area, dims })
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dims
    }

    /// Maps a physical point to the cell under it
    ///
    /// The point is clamped into the grid area first. Cells are half-open
    /// intervals, so a point sitting on an interior boundary belongs to the
    /// cell that starts there.
    pub fn point_to_cell(&self, point: Point) -> CellCoords {
        let rel_x = (point.x - self.area.x).clamp(0, self.area.w - 1);
        let rel_y = (point.y - self.area.y).clamp(0, self.area.h - 1);

        let col = index_for(rel_x, self.area.w, self.dims.columns);
        let row = index_for(rel_y, self.area.h, self.dims.rows);

        CellCoords::new(col, row)
    }

    /// Physical rectangle covering the cell span between `a` and `b`
    ///
    /// Edges come from the grid boundaries rather than accumulated cell widths,
    /// so neighbouring spans always share an edge exactly.
    pub fn span_rect(&self, a: CellCoords, b: CellCoords) -> Result<Rect, GridError> {
        self.check(a)?;
        self.check(b)?;

        let span = CellSpan::between(a, b);
        let left = self.area.x + boundary(span.top_left.col, self.area.w, self.dims.columns);
        let right = self.area.x + boundary(span.bottom_right.col + 1, self.area.w, self.dims.columns);
        let top = self.area.y + boundary(span.top_left.row, self.area.h, self.dims.rows);
        let bottom = self.area.y + boundary(span.bottom_right.row + 1, self.area.h, self.dims.rows);

        Ok(Rect::from_edges(left, top, right, bottom))
    }

    /// Physical rectangle of a single cell
    pub fn cell_rect(&self, cell: CellCoords) -> Result<Rect, GridError> {
        self.span_rect(cell, cell)
    }

    pub fn contains_cell(&self, cell: CellCoords) -> bool {
        cell.col < self.dims.columns && cell.row < self.dims.rows
    }

    fn check(&self, cell: CellCoords) -> Result<(), GridError> {
        if self.contains_cell(cell) {
            Ok(())
        } else {
            Err(GridError::CellOutOfRange {
                cell,
                rows: self.dims.rows,
                columns: self.dims.columns,
            })
        }
    }
}

/// Cell index for an offset already clamped to `[0, extent - 1]`
///
/// Largest index whose rounded start boundary is at or before `offset`, so
/// lookups agree with the edges produced by [`Grid::span_rect`].
fn index_for(offset: i32, extent: i32, count: u32) -> u32 {
    let estimate = (offset as i64 * count as i64) / extent.max(1) as i64;
    let mut index = estimate.clamp(0, count as i64 - 1) as u32;
    while index + 1 < count && boundary(index + 1, extent, count) <= offset {
        index += 1;
    }
    while index > 0 && boundary(index, extent, count) > offset {
        index -= 1;
    }
    index
}

/// Offset of boundary `index` along an axis of `extent` pixels split in `count` cells,
/// rounded half up
fn boundary(index: u32, extent: i32, count: u32) -> i32 {
    let numerator = 2 * index as i64 * extent as i64 + count as i64;
    (numerator / (2 * count as i64)) as i32
}
