//! Thread DPI awareness scoping
//!
//! Geometry calls only return physical pixels when the calling thread is
//! per-monitor-v2 aware. The override is thread-local, so it is wrapped in a
//! guard that puts the previous context back when dropped.

use windows::Win32::UI::HiDpi::{
    DPI_AWARENESS_CONTEXT, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    SetProcessDpiAwarenessContext, SetThreadDpiAwarenessContext,
};

/// RAII guard for a thread DPI awareness override
///
/// If the override could not be applied the guard is inert and restores nothing.
pub struct DpiAwarenessScope {
    previous: Option<DPI_AWARENESS_CONTEXT>,
}

impl DpiAwarenessScope {
    /// Switches the current thread to per-monitor-v2 awareness
    pub fn per_monitor_v2() -> Self {
        let previous = unsafe { SetThreadDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
        if previous.0 == 0 {
            tracing::warn!("SetThreadDpiAwarenessContext failed, geometry may be virtualized");
            return Self { previous: None };
        }
        Self {
            previous: Some(previous),
        }
    }

    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }
}

impl Drop for DpiAwarenessScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            unsafe {
                SetThreadDpiAwarenessContext(previous);
            }
        }
    }
}

/// Declares the whole process per-monitor-v2 aware
///
/// Must run before any window is created. Returns false if the awareness
/// was already fixed (manifest or earlier call).
pub fn enable_process_per_monitor_awareness() -> bool {
    match unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Process DPI awareness not changed: {e}");
            false
        }
    }
}
