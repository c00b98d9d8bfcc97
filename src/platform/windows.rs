//! General Windows platform utilities
//!
//! Conversions between domain types and Win32 structures, plus small
//! process-level queries that don't fit a specialized module.

use crate::domain::core::{Point, Rect, WindowId};
use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::GetWindowThreadProcessId;

/// Converts a Windows RECT to domain rectangle
pub fn win32_rect_to_rect(rect: &RECT) -> Rect {
    Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom)
}

pub fn point_to_win32(point: Point) -> POINT {
    POINT { x: point.x, y: point.y }
}

pub fn hwnd_to_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0)
}

pub fn id_to_hwnd(id: WindowId) -> HWND {
    HWND(id.0)
}

/// Process id of this executable
pub fn current_process_id() -> u32 {
    unsafe { GetCurrentProcessId() }
}

/// Returns (thread id, process id) owning `hwnd`
///
/// A thread id of 0 means the handle is no longer valid.
pub fn window_thread_process(hwnd: HWND) -> (u32, u32) {
    let mut pid = 0u32;
    let tid = unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32)) };
    (tid, pid)
}

/// Decodes a NUL-terminated UTF-16 buffer from a Win32 struct
pub fn wide_to_string(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}
