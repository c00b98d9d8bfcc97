//! Drag target resolution and native drag cancellation
//!
//! During an OS-native drag the dragged window is the foreground window even
//! when the cursor has left its bounds, so the foreground window is preferred
//! over a hit test. Windows owned by this process are never targets.

use crate::domain::core::{Point, WindowId};
use crate::platform::window::Win32Window;
use crate::platform::windows::{
    current_process_id, hwnd_to_id, id_to_hwnd, point_to_win32, window_thread_process,
};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::ReleaseCapture;
use windows::Win32::UI::WindowsAndMessaging::{
    GA_ROOT, GetAncestor, GetForegroundWindow, SendMessageW, WM_CANCELMODE, WM_LBUTTONUP,
    WindowFromPoint,
};

/// A top-level window together with its owning process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    id: WindowId,
    pid: u32,
}

/// Picks the drag target among the foreground and hit-test candidates
fn pick_target(foreground: Option<Candidate>, hit: Option<Candidate>, own_pid: u32) -> Option<WindowId> {
    [foreground, hit]
        .into_iter()
        .flatten()
        .find(|c| !c.id.is_null() && c.pid != own_pid)
        .map(|c| c.id)
}

fn root_candidate(hwnd: HWND) -> Option<Candidate> {
    if hwnd.0 == 0 {
        return None;
    }
    let root = unsafe { GetAncestor(hwnd, GA_ROOT) };
    let root = if root.0 == 0 { hwnd } else { root };
    let (tid, pid) = window_thread_process(root);
    if tid == 0 {
        return None;
    }
    Some(Candidate {
        id: hwnd_to_id(root),
        pid,
    })
}

/// Resolves the top-level window being dragged at `point`
///
/// Returns None when nothing suitable is found or the only candidates belong
/// to this process.
pub fn resolve_target(point: Point) -> Option<WindowId> {
    let foreground = root_candidate(unsafe { GetForegroundWindow() });
    let hit = root_candidate(unsafe { WindowFromPoint(point_to_win32(point)) });
    let target = pick_target(foreground, hit, current_process_id());
    tracing::trace!(?point, ?foreground, ?hit, ?target, "Resolved drag target");
    target
}

/// Terminates the native move/size loop on `window`
///
/// Sends cancel-mode then a synthetic primary-button-up, then releases any
/// capture. Safe to call on windows that are no longer dragging.
pub fn break_drag(window: WindowId) {
    let hwnd = id_to_hwnd(window);
    unsafe {
        SendMessageW(hwnd, WM_CANCELMODE, WPARAM(0), LPARAM(0));
        SendMessageW(hwnd, WM_LBUTTONUP, WPARAM(0), LPARAM(0));
        if let Err(e) = ReleaseCapture() {
            tracing::trace!("ReleaseCapture: {e}");
        }
    }
    tracing::debug!(%window, "Native drag broken");
}

/// Restores `window` if it is minimized
///
/// Returns true if a restore was issued.
pub fn ensure_restored(window: WindowId) -> bool {
    let window = Win32Window::new(window);
    if window.is_minimized() {
        window.restore();
        tracing::debug!(window = %window.id(), "Restored minimized window");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: isize, pid: u32) -> Option<Candidate> {
        Some(Candidate { id: WindowId(id), pid })
    }

    #[test]
    fn foreground_wins_over_hit_test() {
        let target = pick_target(candidate(0x10, 42), candidate(0x20, 43), 7);
        assert_eq!(target, Some(WindowId(0x10)));
    }

    #[test]
    fn own_foreground_falls_back_to_hit_test() {
        let target = pick_target(candidate(0x10, 7), candidate(0x20, 43), 7);
        assert_eq!(target, Some(WindowId(0x20)));
    }

    #[test]
    fn own_windows_are_never_targets() {
        assert_eq!(pick_target(candidate(0x10, 7), candidate(0x20, 7), 7), None);
        assert_eq!(pick_target(None, candidate(0x20, 7), 7), None);
        assert_eq!(pick_target(None, None, 7), None);
    }

    #[test]
    fn null_handles_are_skipped() {
        assert_eq!(pick_target(candidate(0, 42), candidate(0x20, 43), 7), Some(WindowId(0x20)));
    }

    #[test]
    fn break_drag_on_dead_window_is_a_no_op() {
        break_drag(WindowId(0x7fff_0003));
        break_drag(WindowId(0x7fff_0003));
    }

    mod live {
        use super::super::*;
        use std::sync::mpsc;
        use std::time::{Duration, Instant};
        use windows::Win32::UI::WindowsAndMessaging::{
            CreateWindowExW, DestroyWindow, DispatchMessageW, MSG, PM_REMOVE, PeekMessageW,
            PostMessageW, SC_MOVE, SW_SHOW, SetForegroundWindow, ShowWindow, TranslateMessage,
            WM_SYSCOMMAND, WS_EX_TOPMOST, WS_OVERLAPPEDWINDOW,
        };
        use windows::core::w;

        fn create_fixture() -> HWND {
            unsafe {
                let hwnd = CreateWindowExW(
                    WS_EX_TOPMOST,
                    w!("STATIC"),
                    w!("gridsnap fixture"),
                    WS_OVERLAPPEDWINDOW,
                    200,
                    200,
                    400,
                    300,
                    None,
                    None,
                    None,
                    None,
                );
                ShowWindow(hwnd, SW_SHOW);
                hwnd
            }
        }

        fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
            let start = Instant::now();
            while start.elapsed() < timeout {
                if condition() {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            condition()
        }

        #[test]
        #[ignore = "needs an interactive desktop session"]
        fn own_window_is_not_a_target() {
            let hwnd = create_fixture();
            unsafe {
                SetForegroundWindow(hwnd);
            }
            assert_eq!(resolve_target(Point::new(400, 350)), None);
            unsafe {
                DestroyWindow(hwnd).ok();
            }
        }

        #[test]
        #[ignore = "needs an interactive desktop session"]
        fn break_drag_ends_a_native_move_loop() {
            let (tx, rx) = mpsc::channel();
            let fixture = std::thread::spawn(move || unsafe {
                let hwnd = create_fixture();
                tx.send(hwnd.0).unwrap();
                // Keyboard-driven move enters the same modal move/size loop as a drag
                PostMessageW(hwnd, WM_SYSCOMMAND, WPARAM(SC_MOVE as usize), LPARAM(0)).unwrap();
                let mut msg = MSG::default();
                let start = Instant::now();
                while start.elapsed() < Duration::from_secs(5) {
                    while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                        TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                DestroyWindow(hwnd).ok();
            });

            let id = WindowId(rx.recv().unwrap());
            let window = Win32Window::new(id);
            assert!(wait_until(Duration::from_secs(2), || window.is_in_move_size_loop()));

            break_drag(id);
            assert!(wait_until(Duration::from_secs(2), || !window.is_in_move_size_loop()));

            fixture.join().unwrap();
        }
    }
}
