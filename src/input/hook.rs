//! Global low-level input hooks
//!
//! Critical threading requirements:
//! - Hooks are installed on a dedicated thread that pumps its own messages
//! - Callbacks run serialized on that thread, one event at a time
//! - Callbacks must return quickly or the OS silently removes the hook
//! - Any failure inside a callback passes the event through untouched

use crate::domain::core::Point;
use crate::input::events::{InputEvent, MouseButton};
use std::cell::RefCell;
use std::collections::HashSet;
use std::thread::JoinHandle;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT,
    PM_NOREMOVE, PeekMessageW, PostThreadMessageW, SetWindowsHookExW, TranslateMessage,
    UnhookWindowsHookEx, WH_KEYBOARD_LL, WINDOWS_HOOK_ID, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN,
    WM_LBUTTONUP, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

/// Errors that can occur while installing the hooks
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to install {kind} hook: {message}")]
    InstallFailed { kind: &'static str, message: String },
    #[error("Failed to spawn hook thread: {0}")]
    ThreadSpawnFailed(#[from] std::io::Error),
    #[error("Hook thread exited before reporting readiness")]
    ThreadDied,
}

/// Receives every event seen by the hooks
///
/// Returning true swallows the event. Key events are never swallowed,
/// whatever the handler returns.
pub trait HookHandler: Send + 'static {
    fn on_event(&mut self, event: InputEvent) -> bool;
}

/// RAII wrapper for an installed hook
struct HookHandle {
    hook: HHOOK,
    kind: &'static str,
}

impl HookHandle {
    fn install(kind: &'static str, id: WINDOWS_HOOK_ID, proc: HookProc) -> Result<Self, HookError> {
        let hook = unsafe { SetWindowsHookExW(id, Some(proc), None, 0) }.map_err(|e| {
            HookError::InstallFailed {
                kind,
                message: e.to_string(),
            }
        })?;
        tracing::debug!("{kind} hook installed");
        Ok(Self { hook, kind })
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        unsafe {
            if !self.hook.is_invalid() {
                let _ = UnhookWindowsHookEx(self.hook);
            }
        }
        tracing::debug!("{} hook uninstalled", self.kind);
    }
}

type HookProc = unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT;

struct HookContext {
    handler: Box<dyn HookHandler>,
    trigger_keys: HashSet<u32>,
}

thread_local! {
    static HOOK_CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

/// Runs the handler for `event`; false on re-entrancy or panic
fn dispatch(event: InputEvent) -> bool {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        HOOK_CONTEXT.with(|ctx| match ctx.try_borrow_mut() {
            Ok(mut guard) => guard.as_mut().is_some_and(|c| c.handler.on_event(event)),
            Err(_) => {
                tracing::trace!(?event, "Re-entrant hook event passed through");
                false
            }
        })
    }));
    result.unwrap_or_else(|_| {
        tracing::error!(?event, "Hook handler panicked, event passed through");
        false
    })
}

fn is_trigger_key(vk: u32) -> bool {
    HOOK_CONTEXT.with(|ctx| {
        ctx.try_borrow()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.trigger_keys.contains(&vk)))
            .unwrap_or(false)
    })
}

/// Maps a mouse hook message to an input event
fn mouse_event(message: u32, point: Point) -> Option<InputEvent> {
    match message {
        WM_MOUSEMOVE => Some(InputEvent::PointerMove(point)),
        WM_LBUTTONDOWN => Some(InputEvent::ButtonDown(MouseButton::Primary, point)),
        WM_LBUTTONUP => Some(InputEvent::ButtonUp(MouseButton::Primary, point)),
        WM_RBUTTONDOWN => Some(InputEvent::ButtonDown(MouseButton::Secondary, point)),
        WM_RBUTTONUP => Some(InputEvent::ButtonUp(MouseButton::Secondary, point)),
        _ => None,
    }
}

/// Maps a keyboard hook message to an input event
fn key_event(message: u32, vk: u32) -> Option<InputEvent> {
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(InputEvent::TriggerKeyDown(vk)),
        WM_KEYUP | WM_SYSKEYUP => Some(InputEvent::TriggerKeyUp(vk)),
        _ => None,
    }
}

unsafe extern "system" fn mouse_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 || lparam.0 == 0 {
        return unsafe { CallNextHookEx(None, code, wparam, lparam) };
    }

    let data = unsafe { &*(lparam.0 as *const MSLLHOOKSTRUCT) };
    let point = Point::new(data.pt.x, data.pt.y);
    if let Some(event) = mouse_event(wparam.0 as u32, point) {
        if dispatch(event) {
            return LRESULT(1);
        }
    }

    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

unsafe extern "system" fn keyboard_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && lparam.0 != 0 {
        let data = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        if is_trigger_key(data.vkCode) {
            if let Some(event) = key_event(wparam.0 as u32, data.vkCode) {
                dispatch(event);
            }
        }
    }

    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

/// Dedicated thread owning the global hooks
///
/// Hooks are removed and the thread joined exactly once, on [`HookThread::stop`]
/// or drop.
#[derive(Debug)]
pub struct HookThread {
    thread_id: u32,
    join: Option<JoinHandle<()>>,
}

impl HookThread {
    /// Spawns the hook thread and waits until the hooks are installed
    ///
    /// The keyboard hook is only installed when `trigger_keys` is not empty.
    pub fn spawn(handler: impl HookHandler, trigger_keys: &[u32]) -> Result<Self, HookError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, HookError>>(1);
        let trigger_keys: HashSet<u32> = trigger_keys.iter().copied().collect();

        let join = std::thread::Builder::new()
            .name("gridsnap-hook".into())
            .spawn(move || run_hook_thread(Box::new(handler), trigger_keys, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(Self {
                thread_id,
                join: Some(join),
            }),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(HookError::ThreadDied)
            }
        }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Removes the hooks and joins the thread
    pub fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            tracing::warn!("Could not signal hook thread: {e}");
            return;
        }
        if join.join().is_err() {
            tracing::error!("Hook thread panicked during shutdown");
        }
    }
}

impl Drop for HookThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_hook_thread(
    handler: Box<dyn HookHandler>,
    trigger_keys: HashSet<u32>,
    ready: crossbeam_channel::Sender<Result<u32, HookError>>,
) {
    let thread_id = unsafe { GetCurrentThreadId() };

    // Force creation of the thread message queue before anyone posts to it
    let mut msg = MSG::default();
    unsafe {
        PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }

    let want_keyboard = !trigger_keys.is_empty();
    HOOK_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = Some(HookContext { handler, trigger_keys });
    });

    let mouse = match HookHandle::install("mouse", WH_MOUSE_LL, mouse_hook_proc) {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let keyboard = if want_keyboard {
        match HookHandle::install("keyboard", WH_KEYBOARD_LL, keyboard_hook_proc) {
            Ok(hook) => Some(hook),
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        }
    } else {
        None
    };

    tracing::info!(keyboard = keyboard.is_some(), "Input hooks running");
    let _ = ready.send(Ok(thread_id));

    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if ret.0 == 0 || ret.0 == -1 {
            break;
        }
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    drop(keyboard);
    drop(mouse);
    HOOK_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = None;
    });
    tracing::info!("Input hooks stopped");
}
