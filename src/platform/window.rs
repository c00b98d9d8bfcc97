//! Window geometry and positioning
//!
//! This module handles:
//! - Reading a window's outer rectangle and its DWM visual frame
//! - Moving and resizing without activating or reordering
//! - Minimized state and the native move/size loop status
//!
//! All rectangles are physical pixels as long as the calling thread is
//! per-monitor-v2 aware (see `platform::dpi`).

use crate::domain::core::{Rect, WindowId};
use crate::domain::placement::FrameSurface;
use crate::platform::windows::{id_to_hwnd, win32_rect_to_rect, window_thread_process};
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Dwm::{DWMWA_EXTENDED_FRAME_BOUNDS, DwmGetWindowAttribute};
use windows::Win32::UI::WindowsAndMessaging::*;

/// Error types for window operations
#[derive(Debug)]
pub enum WindowError {
    /// Window handle is invalid
    InvalidHandle(WindowId),
    /// GetWindowRect failed
    OuterRectFailed(WindowId),
    /// DWM could not report the extended frame
    VisualFrameFailed(WindowId),
    /// SetWindowPos failed
    PositionFailed(WindowId),
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::InvalidHandle(id) => write!(f, "Invalid window handle {id}"),
            WindowError::OuterRectFailed(id) => write!(f, "Failed to read outer rect of window {id}"),
            WindowError::VisualFrameFailed(id) => {
                write!(f, "Failed to read visual frame of window {id}")
            }
            WindowError::PositionFailed(id) => write!(f, "Failed to position window {id}"),
        }
    }
}

impl std::error::Error for WindowError {}

/// A live top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Win32Window {
    id: WindowId,
}

impl Win32Window {
    pub fn new(id: WindowId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    fn hwnd(&self) -> HWND {
        id_to_hwnd(self.id)
    }

    pub fn exists(&self) -> bool {
        unsafe { IsWindow(self.hwnd()).as_bool() }
    }

    pub fn is_minimized(&self) -> bool {
        unsafe { IsIconic(self.hwnd()).as_bool() }
    }

    /// Restores a minimized or maximized window to its normal state
    pub fn restore(&self) {
        unsafe {
            ShowWindow(self.hwnd(), SW_RESTORE);
        }
    }

    /// Whether the owning GUI thread reports a native move/size loop on this window
    pub fn is_in_move_size_loop(&self) -> bool {
        let (thread_id, _) = window_thread_process(self.hwnd());
        if thread_id == 0 {
            return false;
        }

        let mut info = GUITHREADINFO {
            cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
            ..Default::default()
        };
        if unsafe { GetGUIThreadInfo(thread_id, &mut info) }.is_err() {
            return false;
        }

        // hwndMoveSize is not always populated for DWM-hosted drags, the flag is
        (info.flags.0 & GUI_INMOVESIZE.0) != 0
    }
}

impl FrameSurface for Win32Window {
    type Error = WindowError;

    fn outer_rect(&self) -> Result<Rect, WindowError> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(self.hwnd(), &mut rect) }.map_err(|_| WindowError::OuterRectFailed(self.id))?;
        Ok(win32_rect_to_rect(&rect))
    }

    fn visual_frame(&self) -> Result<Rect, WindowError> {
        let mut rect = RECT::default();
        unsafe {
            DwmGetWindowAttribute(
                self.hwnd(),
                DWMWA_EXTENDED_FRAME_BOUNDS,
                &mut rect as *mut RECT as *mut _,
                std::mem::size_of::<RECT>() as u32,
            )
        }
        .map_err(|_| WindowError::VisualFrameFailed(self.id))?;
        Ok(win32_rect_to_rect(&rect))
    }

    /// SWP_NOACTIVATE keeps focus, SWP_NOZORDER ignores the insert-after handle
    fn apply_outer_rect(&mut self, rect: Rect) -> Result<(), WindowError> {
        if !self.exists() {
            return Err(WindowError::InvalidHandle(self.id));
        }
        unsafe {
            SetWindowPos(
                self.hwnd(),
                HWND(0),
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                SWP_NOZORDER | SWP_NOACTIVATE | SWP_SHOWWINDOW | SWP_FRAMECHANGED | SWP_NOCOPYBITS,
            )
        }
        .map_err(|_| WindowError::PositionFailed(self.id))
    }
}
