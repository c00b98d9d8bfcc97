//! Application controller and coordination layer
//!
//! Two threads cooperate. The hook thread owns the low-level hooks and the
//! [`GestureMachine`]; it breaks native drags synchronously and queues every
//! other [`Command`] for the UI thread, waking it with a thread message. The
//! UI (main) thread owns the overlay and the [`SessionDriver`] and runs its
//! own message loop until `WM_QUIT`.
//!
//! The final placement of a gesture is applied from a thread timer once the
//! settle delay has elapsed, so the loop keeps pumping in between.

use crossbeam_channel::{Receiver, Sender};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, KillTimer, MSG, PM_NOREMOVE, PeekMessageW, PostThreadMessageW,
    SetTimer, TranslateMessage, WM_APP, WM_QUIT, WM_TIMER,
};

use crate::app::session::{Desktop, PendingCommit, SessionDriver};
use crate::app::state::{Command, GestureMachine, HostProbe};
use crate::config::settings::{JsonSettingsStore, SettingsError};
use crate::domain::core::{Point, WindowId};
use crate::input::events::InputEvent;
use crate::input::hook::{HookError, HookHandler, HookThread};
use crate::platform::monitors::{MonitorDescriptor, MonitorError, monitor_from_point};
use crate::platform::placement::Win32Placer;
use crate::platform::target;
use crate::platform::window::Win32Window;
use crate::ui::overlay::LayeredOverlay;

/// Thread message telling the UI thread that commands are queued
pub const WM_GESTURE_COMMANDS: u32 = WM_APP + 1;

/// Application errors that can occur during controller operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Message loop failed: {0}")]
    MessageLoop(windows::core::Error),

    #[error("Log file error: {0}")]
    LogFile(#[from] std::io::Error),
}

/// [`HostProbe`] answering from live OS state
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Probe;

impl HostProbe for Win32Probe {
    fn primary_button_down(&self) -> bool {
        let state = unsafe { GetAsyncKeyState(VK_LBUTTON.0 as i32) };
        (state as u16 & 0x8000) != 0
    }

    fn resolve_target(&self, point: Point) -> Option<WindowId> {
        target::resolve_target(point)
    }

    fn is_in_move_size_loop(&self, window: WindowId) -> bool {
        Win32Window::new(window).is_in_move_size_loop()
    }
}

/// [`Desktop`] backed by the monitor and window APIs
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Desktop;

impl Desktop for Win32Desktop {
    fn monitor_at(&self, point: Point) -> Result<MonitorDescriptor, MonitorError> {
        monitor_from_point(point)
    }

    fn ensure_restored(&self, window: WindowId) -> bool {
        target::ensure_restored(window)
    }
}

/// Hook-thread side: state machine plus the hand-off to the UI thread
struct HookBridge {
    machine: GestureMachine,
    probe: Win32Probe,
    commands: Sender<Command>,
    ui_thread_id: u32,
}

impl HookBridge {
    fn new(commands: Sender<Command>, ui_thread_id: u32) -> Self {
        let probe = Win32Probe;
        Self {
            machine: GestureMachine::new(&probe),
            probe,
            commands,
            ui_thread_id,
        }
    }
}

impl HookHandler for HookBridge {
    fn on_event(&mut self, event: InputEvent) -> bool {
        let transition = self.machine.handle(event, &self.probe);

        let mut queued = false;
        for command in transition.commands {
            match command {
                // The move loop has to end before this callback returns
                Command::BreakDrag(window) => target::break_drag(window),
                other => {
                    if self.commands.send(other).is_err() {
                        tracing::warn!("UI thread gone, dropping gesture command");
                        continue;
                    }
                    queued = true;
                }
            }
        }

        if queued {
            if let Err(e) = unsafe { PostThreadMessageW(self.ui_thread_id, WM_GESTURE_COMMANDS, WPARAM(0), LPARAM(0)) } {
                tracing::warn!("Could not wake UI thread: {e}");
            }
        }

        transition.decision.swallows()
    }
}

/// Collapses runs of pointer updates to their last point
///
/// Placement is slow compared to the mouse event rate; only the most recent
/// position of a run matters.
pub fn coalesce_pointer_updates(commands: Vec<Command>) -> Vec<Command> {
    let mut out: Vec<Command> = Vec::with_capacity(commands.len());
    for command in commands {
        if let (Command::UpdatePointer(_), Some(Command::UpdatePointer(_))) = (&command, out.last()) {
            out.pop();
        }
        out.push(command);
    }
    out
}

type LiveDriver = SessionDriver<LayeredOverlay, Win32Placer, JsonSettingsStore, Win32Desktop>;

/// Main application controller
///
/// Must be created and run on the thread that owns the overlay.
pub struct AppController {
    driver: LiveDriver,
    trigger_keys: Vec<u32>,
    ui_thread_id: u32,
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    /// Thread timer armed for the driver's pending commit
    commit_timer: Option<(usize, PendingCommit)>,
}

impl AppController {
    pub fn new(store: JsonSettingsStore) -> Self {
        let settings = store.settings().clone();
        let (sender, receiver) = crossbeam_channel::unbounded();

        // Make sure the UI thread has a message queue before the hook posts to it
        let mut msg = MSG::default();
        unsafe {
            let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        }

        Self {
            driver: SessionDriver::new(
                LayeredOverlay::new(settings.overlay.palette()),
                Win32Placer,
                store,
                Win32Desktop,
                settings.settle_delay(),
            ),
            trigger_keys: settings.trigger_keys,
            ui_thread_id: unsafe { GetCurrentThreadId() },
            sender,
            receiver,
            commit_timer: None,
        }
    }

    /// Thread to post `WM_QUIT` to for shutdown
    pub fn ui_thread_id(&self) -> u32 {
        self.ui_thread_id
    }

    /// Installs the hooks and pumps messages until `WM_QUIT`
    ///
    /// A hook installation failure is logged and the loop runs anyway, so
    /// the process stays up but inert.
    pub fn run(&mut self) -> Result<(), AppError> {
        let bridge = HookBridge::new(self.sender.clone(), self.ui_thread_id);
        let mut hook = match HookThread::spawn(bridge, &self.trigger_keys) {
            Ok(hook) => {
                tracing::info!(
                    hook_thread = hook.thread_id(),
                    trigger_keys = ?self.trigger_keys,
                    "Input hooks installed"
                );
                Some(hook)
            }
            Err(e) => {
                tracing::error!("Input hooks unavailable, running inert: {e}");
                None
            }
        };

        let result = self.pump_messages();

        if let Some(hook) = hook.as_mut() {
            hook.stop();
        }
        self.disarm_commit_timer();
        self.driver.complete_commit();
        self.driver.abort();
        tracing::info!("Controller stopped");
        result
    }

    fn pump_messages(&mut self) -> Result<(), AppError> {
        let mut msg = MSG::default();
        loop {
            let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            match ret.0 {
                0 => return Ok(()),
                -1 => return Err(AppError::MessageLoop(windows::core::Error::from_win32())),
                _ => {}
            }

            if msg.message == WM_GESTURE_COMMANDS && msg.hwnd.0 == 0 {
                self.drain_commands();
                self.sync_commit_timer();
                continue;
            }
            if msg.message == WM_TIMER
                && msg.hwnd.0 == 0
                && self.commit_timer.is_some_and(|(id, _)| id == msg.wParam.0)
            {
                self.disarm_commit_timer();
                self.driver.complete_commit();
                self.sync_commit_timer();
                continue;
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn drain_commands(&mut self) {
        let pending: Vec<Command> = self.receiver.try_iter().collect();
        for command in coalesce_pointer_updates(pending) {
            self.driver.execute(command);
        }
    }

    /// Arms, re-arms or kills the commit timer to match the driver
    fn sync_commit_timer(&mut self) {
        let pending = self.driver.pending_commit();
        if pending == self.commit_timer.map(|(_, commit)| commit) {
            return;
        }
        self.disarm_commit_timer();
        let Some(commit) = pending else {
            return;
        };

        let delay_ms = u32::try_from(self.driver.settle_delay().as_millis()).unwrap_or(u32::MAX);
        let id = unsafe { SetTimer(None, 0, delay_ms, None) };
        if id == 0 {
            tracing::warn!(
                "Settle timer unavailable, placing immediately: {}",
                windows::core::Error::from_win32()
            );
            self.driver.complete_commit();
            return;
        }
        tracing::trace!(timer = id, delay_ms, target = %commit.target, "Final placement scheduled");
        self.commit_timer = Some((id, commit));
    }

    fn disarm_commit_timer(&mut self) {
        if let Some((id, _)) = self.commit_timer.take() {
            if let Err(e) = unsafe { KillTimer(None, id) } {
                tracing::debug!(timer = id, "Settle timer already gone: {e}");
            }
        }
    }
}

/// Asks the UI loop on `ui_thread_id` to exit
pub fn request_quit(ui_thread_id: u32) -> bool {
    match unsafe { PostThreadMessageW(ui_thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Could not post quit message: {e}");
            false
        }
    }
}
