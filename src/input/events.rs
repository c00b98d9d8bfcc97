//! Raw input events delivered by the low-level hooks
//!
//! Hook callbacks translate `MSLLHOOKSTRUCT`/`KBDLLHOOKSTRUCT` payloads into
//! these values before anything else looks at them, so the gesture logic
//! never touches Win32 types.

use crate::domain::core::Point;

/// Mouse buttons the gesture logic cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left button, which drives native window drags
    Primary,
    /// Right button, which triggers the grid
    Secondary,
}

/// One event from the serialized hook stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerMove(Point),
    ButtonDown(MouseButton, Point),
    ButtonUp(MouseButton, Point),
    /// A configured trigger key went down (auto-repeat included)
    TriggerKeyDown(u32),
    TriggerKeyUp(u32),
}

impl InputEvent {
    /// Screen position carried by mouse events
    pub fn point(&self) -> Option<Point> {
        match self {
            InputEvent::PointerMove(p) | InputEvent::ButtonDown(_, p) | InputEvent::ButtonUp(_, p) => Some(*p),
            InputEvent::TriggerKeyDown(_) | InputEvent::TriggerKeyUp(_) => None,
        }
    }
}
