//! Monitor lookup and display-device naming
//!
//! This module is responsible for:
//! - Finding the monitor nearest to a physical point and its work area
//! - Resolving the human-readable monitor name behind a GDI device name
//!
//! All rectangles are physical pixels; the process is per-monitor-v2 aware
//! and secondary monitors can have negative coordinates.

use crate::domain::core::{Point, Rect};
use crate::platform::windows::{point_to_win32, wide_to_string, win32_rect_to_rect};
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::*;
use windows::core::PCWSTR;

/// Handle-free description of the monitor a gesture starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDescriptor {
    /// GDI device name, e.g. `\\.\DISPLAY1`; stable key for settings
    pub device_name: String,
    pub friendly_name: String,
    /// Work area (excluding taskbar)
    pub work_area: Rect,
}

/// Error types for monitor operations
#[derive(Debug)]
pub enum MonitorError {
    /// Monitor not found at specified location
    MonitorNotFound(Point),
    /// Failed to lookup monitor information
    MonitorLookupFailed,
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::MonitorNotFound(p) => {
                write!(f, "No monitor at ({}, {})", p.x, p.y)
            }
            MonitorError::MonitorLookupFailed => write!(f, "Failed to lookup monitor information"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Gets the monitor nearest to the specified physical point
pub fn monitor_from_point(point: Point) -> Result<MonitorDescriptor, MonitorError> {
    let hmonitor = unsafe { MonitorFromPoint(point_to_win32(point), MONITOR_DEFAULTTONEAREST) };
    if hmonitor.is_invalid() {
        return Err(MonitorError::MonitorNotFound(point));
    }

    let mut info = MONITORINFOEXW {
        monitorInfo: MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFOEXW>() as u32,
            ..Default::default()
        },
        ..Default::default()
    };
    if unsafe { GetMonitorInfoW(hmonitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO) } == FALSE {
        return Err(MonitorError::MonitorLookupFailed);
    }

    let device_name = wide_to_string(&info.szDevice);
    Ok(MonitorDescriptor {
        friendly_name: friendly_monitor_name(&device_name),
        device_name,
        work_area: win32_rect_to_rect(&info.monitorInfo.rcWork),
    })
}

/// Human-readable name of the monitor attached to a GDI device
///
/// Walks the display adapters, finds the one whose device name matches and
/// asks for its first attached monitor. Falls back to `device_name` itself.
pub fn friendly_monitor_name(device_name: &str) -> String {
    let mut adapter = DISPLAY_DEVICEW {
        cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
        ..Default::default()
    };

    let mut i = 0;
    while unsafe { EnumDisplayDevicesW(PCWSTR::null(), i, &mut adapter, 0) }.as_bool() {
        i += 1;
        if wide_to_string(&adapter.DeviceName) != device_name {
            continue;
        }

        let mut monitor = DISPLAY_DEVICEW {
            cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
            ..Default::default()
        };
        let found = unsafe { EnumDisplayDevicesW(PCWSTR(adapter.DeviceName.as_ptr()), 0, &mut monitor, 0) };
        if found.as_bool() {
            let name = wide_to_string(&monitor.DeviceString);
            if !name.is_empty() {
                return name;
            }
        }
        break;
    }

    device_name.to_string()
}
