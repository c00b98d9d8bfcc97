//! Drag-selection state over a monitor grid
//!
//! Tracks the start and current cell of a pointer-driven selection and decides
//! when a new rectangle has to be pushed to the placement engine. Preview
//! updates are de-duplicated against the last applied cell pair; the final
//! commit always produces a rectangle.

use crate::domain::core::{Point, Rect};
use crate::domain::grid::{CellCoords, CellSpan, Grid};

/// State of the current selection process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    /// No selection has been started
    NotStarted,
    /// Start cell fixed, current cell follows the pointer
    InProgress { start: CellCoords, current: CellCoords },
}

/// Selection model for one gesture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSelection {
    grid: Grid,
    state: SelectionState,
    /// (start, current) pair most recently handed to placement
    last_applied: Option<(CellCoords, CellCoords)>,
}

impl GridSelection {
    /// Creates an empty selection pinned to `grid`
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            state: SelectionState::NotStarted,
            last_applied: None,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, SelectionState::InProgress { .. })
    }

    /// Maps a physical point to a cell of the pinned grid
    pub fn point_to_cell(&self, point: Point) -> CellCoords {
        self.grid.point_to_cell(point)
    }

    /// Starts the selection at `point`
    ///
    /// Returns false and leaves the selection untouched when one is already open.
    pub fn start(&mut self, point: Point) -> bool {
        if self.is_selecting() {
            return false;
        }
        let cell = self.point_to_cell(point);
        self.state = SelectionState::InProgress { start: cell, current: cell };
        true
    }

    /// Moves the current cell under `point`
    ///
    /// Returns true if the current cell changed.
    pub fn update(&mut self, point: Point) -> bool {
        let cell = self.point_to_cell(point);
        match &mut self.state {
            SelectionState::InProgress { current, .. } if *current != cell => {
                *current = cell;
                true
            }
            _ => false,
        }
    }

    /// Normalized span of the current selection
    pub fn span(&self) -> Option<CellSpan> {
        match self.state {
            SelectionState::InProgress { start, current } => Some(CellSpan::between(start, current)),
            SelectionState::NotStarted => None,
        }
    }

    /// Physical rectangle of the current selection
    pub fn selection_rectangle(&self) -> Option<Rect> {
        match self.state {
            SelectionState::InProgress { start, current } => self.grid.span_rect(start, current).ok(),
            SelectionState::NotStarted => None,
        }
    }

    /// Rectangle to preview, or None if the cell pair was already applied
    pub fn preview(&mut self) -> Option<Rect> {
        let SelectionState::InProgress { start, current } = self.state else {
            return None;
        };
        if self.last_applied == Some((start, current)) {
            return None;
        }
        self.last_applied = Some((start, current));
        self.selection_rectangle()
    }

    /// Rectangle to apply at gesture end, regardless of what was previewed
    pub fn commit(&mut self) -> Option<Rect> {
        let SelectionState::InProgress { start, current } = self.state else {
            return None;
        };
        self.last_applied = Some((start, current));
        self.selection_rectangle()
    }

    /// Drops the selection and the de-duplication memory
    pub fn reset(&mut self) {
        self.state = SelectionState::NotStarted;
        self.last_applied = None;
    }
}
