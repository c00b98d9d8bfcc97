//! UI-side gesture sessions
//!
//! A session lives from "begin" to "finish-and-close" of one snap gesture. It
//! pins the grid of the monitor the gesture started on, feeds pointer
//! positions through the selection model and pushes the resulting rectangles
//! to the overlay and the placement engine.
//!
//! Only a failure to open a session ends it early; its [`SessionLink`] is
//! cleared so the hook side fails open. Preview and final placement failures
//! are logged and the gesture carries on.
//!
//! The final placement waits out a settle delay. The driver does not sleep:
//! it parks a [`PendingCommit`] and the owner of the message loop calls
//! [`SessionDriver::complete_commit`] once the delay has elapsed.

use std::time::Duration;

use crate::app::state::{Command, SessionLink};
use crate::config::settings::{MonitorProfile, SettingsStore};
use crate::domain::core::{Point, Rect, WindowId};
use crate::domain::grid::{Grid, GridDimensions, GridError};
use crate::domain::selection::GridSelection;
use crate::platform::monitors::{MonitorDescriptor, MonitorError};
use crate::platform::placement::WindowPlacer;
use crate::ui::overlay::OverlaySurface;

/// Desktop queries a session needs when it starts
pub trait Desktop {
    /// Monitor nearest to `point`
    fn monitor_at(&self, point: Point) -> Result<MonitorDescriptor, MonitorError>;

    /// Restores `window` if minimized; true if it had to
    fn ensure_restored(&self, window: WindowId) -> bool;
}

/// Errors that prevent a gesture session from opening
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Monitor lookup failed: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Grid setup failed: {0}")]
    Grid(#[from] GridError),

    #[error("Overlay failed: {0}")]
    Overlay(String),
}

/// State of one running gesture
#[derive(Debug)]
pub struct GestureSession {
    target: WindowId,
    link: SessionLink,
    monitor: MonitorDescriptor,
    profile: MonitorProfile,
    selection: GridSelection,
}

impl GestureSession {
    pub fn target(&self) -> WindowId {
        self.target
    }

    pub fn monitor(&self) -> &MonitorDescriptor {
        &self.monitor
    }

    pub fn profile(&self) -> &MonitorProfile {
        &self.profile
    }

    pub fn selection(&self) -> &GridSelection {
        &self.selection
    }
}

/// Final placement of a finished gesture, applied after the settle delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommit {
    pub target: WindowId,
    pub rect: Rect,
}

/// Owns the collaborators and the at-most-one running session
pub struct SessionDriver<O, P, S, D> {
    overlay: O,
    placer: P,
    settings: S,
    desktop: D,
    settle_delay: Duration,
    session: Option<GestureSession>,
    pending: Option<PendingCommit>,
}

impl<O, P, S, D> SessionDriver<O, P, S, D>
where
    O: OverlaySurface,
    P: WindowPlacer,
    S: SettingsStore,
    D: Desktop,
{
    pub fn new(overlay: O, placer: P, settings: S, desktop: D, settle_delay: Duration) -> Self {
        Self {
            overlay,
            placer,
            settings,
            desktop,
            settle_delay,
            session: None,
            pending: None,
        }
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Final placement waiting for [`SessionDriver::complete_commit`]
    pub fn pending_commit(&self) -> Option<PendingCommit> {
        self.pending
    }

    /// Carries out one command from the hook thread
    pub fn execute(&mut self, command: Command) {
        match command {
            Command::BeginSession { target, point, link } => {
                if let Err(e) = self.begin(target, point, link) {
                    tracing::error!(%target, "Gesture session failed to start: {e}");
                    self.abort();
                }
            }
            Command::StartSelection(point) => self.start_selection(point),
            Command::UpdatePointer(point) => self.update_pointer(point),
            Command::FinishAndClose => self.finish(),
            Command::BreakDrag(target) => {
                tracing::warn!(%target, "Drag break reached the UI thread, ignoring");
            }
        }
    }

    /// Opens a session for `target` on the monitor under `point`
    ///
    /// On error the link is already closed; the caller only has to log.
    pub fn begin(&mut self, target: WindowId, point: Point, link: SessionLink) -> Result<(), SessionError> {
        if self.pending.is_some() {
            self.complete_commit();
        }
        if self.session.is_some() {
            tracing::warn!("New gesture while a session is open, closing the old one");
            self.abort();
        }

        let mut session = self.open(target, point, link.clone()).inspect_err(|_| link.close())?;
        session.selection.start(point);
        session.link.mark_selecting();
        tracing::info!(
            %target,
            monitor = %session.monitor.friendly_name,
            rows = session.profile.rows,
            columns = session.profile.columns,
            "Gesture session started"
        );

        self.session = Some(session);
        self.push_preview();
        Ok(())
    }

    /// Starts selecting at `point` if nothing is selected yet
    pub fn start_selection(&mut self, point: Point) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.link.mark_selecting();
        if !session.selection.start(point) {
            tracing::debug!(?point, "Selection already started");
            return;
        }
        self.push_preview();
    }

    pub fn update_pointer(&mut self, point: Point) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.selection.update(point) {
            self.push_preview();
        }
    }

    /// Ends the session and schedules the final placement
    ///
    /// With a zero settle delay the placement is applied right away. The
    /// overlay stays up until the placement has been applied.
    pub fn finish(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.link.close();
        tracing::info!(target = %session.target, "Gesture session finished");

        match session.selection.commit() {
            Some(rect) => {
                self.pending = Some(PendingCommit {
                    target: session.target,
                    rect,
                });
                if self.settle_delay.is_zero() {
                    self.complete_commit();
                }
            }
            None => self.overlay.close(),
        }
    }

    /// Applies the pending final placement and closes the overlay
    pub fn complete_commit(&mut self) {
        let Some(commit) = self.pending.take() else {
            return;
        };
        if let Err(e) = self.placer.place(commit.target, commit.rect) {
            tracing::warn!(target = %commit.target, rect = ?commit.rect, "Final placement failed: {e}");
        }
        self.overlay.close();
    }

    /// Drops the session and any pending placement without applying anything
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            session.link.close();
            tracing::debug!(target = %session.target, "Gesture session aborted");
        }
        self.pending = None;
        self.overlay.close();
    }

    fn open(&mut self, target: WindowId, point: Point, link: SessionLink) -> Result<GestureSession, SessionError> {
        self.desktop.ensure_restored(target);
        let monitor = self.desktop.monitor_at(point)?;
        let profile = self
            .settings
            .get_or_create_monitor_profile(&monitor.device_name, &monitor.friendly_name);
        let grid = Grid::new(monitor.work_area, GridDimensions::new(profile.rows, profile.columns)?)?;

        self.overlay
            .show(monitor.work_area, profile.rows, profile.columns)
            .map_err(|e| SessionError::Overlay(e.to_string()))?;

        Ok(GestureSession {
            target,
            link,
            monitor,
            profile,
            selection: GridSelection::new(grid),
        })
    }

    /// Pushes the current selection if its cell pair has not been applied yet
    ///
    /// Failures are logged only; the next pointer move or the commit retries
    /// with a fresh rectangle.
    fn push_preview(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(rect) = session.selection.preview() else {
            return;
        };
        let target = session.target;

        if let Err(e) = self.overlay.set_selection(rect) {
            tracing::warn!(?rect, "Overlay selection update failed: {e}");
        }
        if let Err(e) = self.placer.place(target, rect) {
            tracing::warn!(%target, ?rect, "Preview placement failed: {e}");
        }
    }
}

impl<O, P, S, D> Drop for SessionDriver<O, P, S, D> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.link.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{GestureMachine, HostProbe};
    use crate::config::settings::SettingsResult;
    use crate::domain::placement::{PlacementError, PlacementReport, WindowBorders};
    use crate::input::events::{InputEvent, MouseButton};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Show(Rect, u32, u32),
        Select(Rect),
        Close,
        Place(WindowId, Rect),
        Restore(WindowId),
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct FakeOverlay {
        log: Log,
        fail_show: bool,
        failing_selections: Cell<u32>,
    }

    impl OverlaySurface for FakeOverlay {
        type Error = String;

        fn show(&mut self, bounds: Rect, rows: u32, columns: u32) -> Result<(), String> {
            if self.fail_show {
                return Err("no desktop".into());
            }
            self.log.borrow_mut().push(Call::Show(bounds, rows, columns));
            Ok(())
        }

        fn set_selection(&mut self, rect: Rect) -> Result<(), String> {
            if self.failing_selections.get() > 0 {
                self.failing_selections.set(self.failing_selections.get() - 1);
                return Err("device lost".into());
            }
            self.log.borrow_mut().push(Call::Select(rect));
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().push(Call::Close);
        }
    }

    /// Fails its first `failures` calls, then succeeds
    struct FakePlacer {
        log: Log,
        failures: u32,
        calls: Rc<Cell<u32>>,
    }

    impl WindowPlacer for FakePlacer {
        fn place(&mut self, window: WindowId, target: Rect) -> Result<PlacementReport, PlacementError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures > 0 {
                self.failures -= 1;
                return Err(PlacementError::ApplyFailed {
                    pass: 1,
                    message: "window busy".into(),
                });
            }
            self.log.borrow_mut().push(Call::Place(window, target));
            Ok(PlacementReport {
                target,
                borders: WindowBorders::ZERO,
                applied: vec![target],
                scale: None,
                residual: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeSettings {
        profiles: HashMap<String, MonitorProfile>,
    }

    impl SettingsStore for FakeSettings {
        fn get_or_create_monitor_profile(&mut self, device_id: &str, friendly_name: &str) -> MonitorProfile {
            self.profiles
                .entry(device_id.to_string())
                .or_insert_with(|| MonitorProfile::new(friendly_name, 2, 3))
                .clone()
        }

        fn save(&self) -> SettingsResult<()> {
            Ok(())
        }
    }

    struct FakeDesktop {
        log: Log,
        monitor: Option<MonitorDescriptor>,
    }

    impl Desktop for FakeDesktop {
        fn monitor_at(&self, point: Point) -> Result<MonitorDescriptor, MonitorError> {
            self.monitor.clone().ok_or(MonitorError::MonitorNotFound(point))
        }

        fn ensure_restored(&self, window: WindowId) -> bool {
            self.log.borrow_mut().push(Call::Restore(window));
            false
        }
    }

    const WORK_AREA: Rect = Rect {
        x: 0,
        y: 0,
        w: 1920,
        h: 1080,
    };
    const TARGET: WindowId = WindowId(0x42);

    type TestDriver = SessionDriver<FakeOverlay, FakePlacer, FakeSettings, FakeDesktop>;

    struct Setup {
        fail_show: bool,
        failing_selections: u32,
        placement_failures: u32,
        has_monitor: bool,
        settle_delay: Duration,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                fail_show: false,
                failing_selections: 0,
                placement_failures: 0,
                has_monitor: true,
                settle_delay: Duration::ZERO,
            }
        }
    }

    impl Setup {
        fn build(self) -> (TestDriver, Log, Rc<Cell<u32>>) {
            let log: Log = Rc::default();
            let calls: Rc<Cell<u32>> = Rc::default();
            let monitor = self.has_monitor.then(|| MonitorDescriptor {
                device_name: r"\\.\DISPLAY1".into(),
                friendly_name: "Test Panel".into(),
                work_area: WORK_AREA,
            });
            let driver = SessionDriver::new(
                FakeOverlay {
                    log: log.clone(),
                    fail_show: self.fail_show,
                    failing_selections: Cell::new(self.failing_selections),
                },
                FakePlacer {
                    log: log.clone(),
                    failures: self.placement_failures,
                    calls: calls.clone(),
                },
                FakeSettings::default(),
                FakeDesktop {
                    log: log.clone(),
                    monitor,
                },
                self.settle_delay,
            );
            (driver, log, calls)
        }
    }

    fn driver() -> (TestDriver, Log) {
        let (driver, log, _) = Setup::default().build();
        (driver, log)
    }

    fn begin(driver: &mut TestDriver, x: i32, y: i32) -> SessionLink {
        let link = SessionLink::new();
        driver.execute(Command::BeginSession {
            target: TARGET,
            point: Point::new(x, y),
            link: link.clone(),
        });
        link
    }

    fn places(log: &Log) -> Vec<Rect> {
        log.borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Place(_, r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn begin_restores_shows_and_previews_start_cell() {
        let (mut driver, log) = driver();
        let link = begin(&mut driver, 100, 100);

        let cell = Rect::new(0, 0, 640, 540);
        assert_eq!(
            *log.borrow(),
            vec![
                Call::Restore(TARGET),
                Call::Show(WORK_AREA, 2, 3),
                Call::Select(cell),
                Call::Place(TARGET, cell),
            ]
        );
        assert!(link.is_alive());
        assert!(link.is_selecting());
        assert_eq!(driver.session().map(|s| s.profile().friendly_name.as_str()), Some("Test Panel"));
    }

    #[test]
    fn pointer_updates_are_deduplicated_per_cell() {
        let (mut driver, log) = driver();
        begin(&mut driver, 100, 100);
        driver.execute(Command::UpdatePointer(Point::new(200, 200)));
        driver.execute(Command::UpdatePointer(Point::new(700, 600)));
        driver.execute(Command::UpdatePointer(Point::new(710, 610)));

        assert_eq!(places(&log), vec![Rect::new(0, 0, 640, 540), Rect::new(0, 0, 1280, 1080)]);
    }

    #[test]
    fn finish_commits_even_when_already_previewed() {
        let (mut driver, log) = driver();
        let link = begin(&mut driver, 1900, 1000);
        driver.execute(Command::FinishAndClose);

        let cell = Rect::new(1280, 540, 640, 540);
        assert_eq!(places(&log), vec![cell, cell]);
        assert_eq!(log.borrow().last(), Some(&Call::Close));
        assert!(!link.is_alive());
        assert!(driver.session().is_none());
        assert!(driver.pending_commit().is_none());
    }

    #[test]
    fn settle_delay_defers_the_final_placement() {
        let (mut driver, log, _) = Setup {
            settle_delay: Duration::from_millis(50),
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 1900, 1000);
        driver.execute(Command::FinishAndClose);

        let cell = Rect::new(1280, 540, 640, 540);
        assert!(!link.is_alive());
        assert!(driver.session().is_none());
        assert_eq!(driver.pending_commit(), Some(PendingCommit { target: TARGET, rect: cell }));
        // Only the preview so far, and the overlay is still up
        assert_eq!(places(&log), vec![cell]);
        assert!(!log.borrow().contains(&Call::Close));

        driver.complete_commit();
        assert_eq!(places(&log), vec![cell, cell]);
        assert_eq!(log.borrow().last(), Some(&Call::Close));
        assert!(driver.pending_commit().is_none());

        // Nothing left to apply
        driver.complete_commit();
        assert_eq!(places(&log).len(), 2);
    }

    #[test]
    fn new_gesture_applies_the_pending_commit_first() {
        let (mut driver, log, _) = Setup {
            settle_delay: Duration::from_millis(50),
            ..Setup::default()
        }
        .build();
        begin(&mut driver, 1900, 1000);
        driver.execute(Command::FinishAndClose);
        begin(&mut driver, 100, 100);

        assert!(driver.pending_commit().is_none());
        assert_eq!(
            places(&log),
            vec![
                Rect::new(1280, 540, 640, 540),
                Rect::new(1280, 540, 640, 540),
                Rect::new(0, 0, 640, 540),
            ]
        );
    }

    #[test]
    fn second_start_selection_is_ignored() {
        let (mut driver, log) = driver();
        begin(&mut driver, 100, 100);
        driver.execute(Command::StartSelection(Point::new(1500, 900)));
        assert_eq!(places(&log).len(), 1);
    }

    #[test]
    fn missing_monitor_fails_open() {
        let (mut driver, log, _) = Setup {
            has_monitor: false,
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 5, 5);
        assert!(!link.is_alive());
        assert!(driver.session().is_none());
        assert!(places(&log).is_empty());
    }

    #[test]
    fn overlay_failure_fails_open() {
        let (mut driver, _log, _) = Setup {
            fail_show: true,
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 5, 5);
        assert!(!link.is_alive());
        assert!(driver.session().is_none());
    }

    #[test]
    fn failed_preview_keeps_the_session_and_still_commits() {
        let (mut driver, log, calls) = Setup {
            placement_failures: 1,
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 5, 5);

        assert!(link.is_alive());
        assert!(driver.session().is_some());
        assert!(!log.borrow().contains(&Call::Close));

        driver.execute(Command::UpdatePointer(Point::new(700, 600)));
        driver.execute(Command::FinishAndClose);

        assert_eq!(calls.get(), 3);
        assert_eq!(places(&log), vec![Rect::new(0, 0, 1280, 1080), Rect::new(0, 0, 1280, 1080)]);
        assert!(!link.is_alive());
        assert_eq!(log.borrow().last(), Some(&Call::Close));
    }

    #[test]
    fn failed_overlay_update_keeps_the_session() {
        let (mut driver, log, _) = Setup {
            failing_selections: 1,
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 5, 5);

        assert!(link.is_alive());
        // Placement still follows the selection even if drawing it failed
        assert_eq!(places(&log), vec![Rect::new(0, 0, 640, 540)]);
        driver.execute(Command::UpdatePointer(Point::new(1000, 5)));
        assert!(log.borrow().contains(&Call::Select(Rect::new(0, 0, 1280, 540))));
    }

    #[test]
    fn failed_final_placement_still_closes() {
        let (mut driver, log, calls) = Setup {
            placement_failures: 2,
            ..Setup::default()
        }
        .build();
        let link = begin(&mut driver, 5, 5);
        driver.execute(Command::FinishAndClose);

        assert_eq!(calls.get(), 2);
        assert!(places(&log).is_empty());
        assert!(!link.is_alive());
        assert!(driver.session().is_none());
        assert_eq!(log.borrow().last(), Some(&Call::Close));
    }

    #[test]
    fn new_begin_replaces_open_session() {
        let (mut driver, _log) = driver();
        let first = begin(&mut driver, 5, 5);
        let second = SessionLink::new();
        driver.execute(Command::BeginSession {
            target: WindowId(0x43),
            point: Point::new(5, 5),
            link: second.clone(),
        });
        assert!(!first.is_alive());
        assert!(second.is_alive());
        assert_eq!(driver.session().map(|s| s.target()), Some(WindowId(0x43)));
    }

    #[test]
    fn commands_without_session_are_noops() {
        let (mut driver, log) = driver();
        driver.execute(Command::UpdatePointer(Point::new(5, 5)));
        driver.execute(Command::StartSelection(Point::new(5, 5)));
        driver.execute(Command::FinishAndClose);
        assert!(places(&log).is_empty());
    }

    /// Host that is always mid-drag on `TARGET` until told otherwise
    struct DraggingHost {
        primary: Cell<bool>,
    }

    impl HostProbe for DraggingHost {
        fn primary_button_down(&self) -> bool {
            self.primary.get()
        }
        fn resolve_target(&self, _point: Point) -> Option<WindowId> {
            Some(TARGET)
        }
        fn is_in_move_size_loop(&self, _window: WindowId) -> bool {
            self.primary.get()
        }
    }

    /// Feeds `events` through a gesture machine into `driver`, like the hook bridge does
    fn run_gesture(driver: &mut TestDriver, host: &DraggingHost, events: Vec<InputEvent>) -> Vec<bool> {
        let mut machine = GestureMachine::new(host);
        let mut swallowed = Vec::new();
        for event in events {
            if let InputEvent::ButtonUp(MouseButton::Primary, _) = event {
                host.primary.set(false);
            }
            let transition = machine.handle(event, host);
            swallowed.push(transition.decision.swallows());
            for command in transition.commands {
                if !matches!(command, Command::BreakDrag(_)) {
                    driver.execute(command);
                }
            }
        }
        swallowed
    }

    #[test]
    fn drag_gesture_previews_then_commits_on_primary_release() {
        let (mut driver, log) = driver();
        let host = DraggingHost {
            primary: Cell::new(true),
        };
        let swallowed = run_gesture(
            &mut driver,
            &host,
            vec![
                InputEvent::PointerMove(Point::new(700, 300)),
                InputEvent::ButtonDown(MouseButton::Secondary, Point::new(700, 300)),
                InputEvent::ButtonUp(MouseButton::Secondary, Point::new(700, 300)),
                InputEvent::PointerMove(Point::new(900, 400)),
                InputEvent::PointerMove(Point::new(1850, 1000)),
                InputEvent::ButtonUp(MouseButton::Secondary, Point::new(1850, 1000)),
                InputEvent::ButtonUp(MouseButton::Primary, Point::new(1850, 1000)),
            ],
        );

        // Only the handled down and its own up are swallowed
        assert_eq!(swallowed, vec![false, true, true, false, false, false, false]);
        assert_eq!(
            places(&log),
            vec![
                Rect::new(640, 0, 640, 540),
                Rect::new(640, 0, 1280, 1080),
                Rect::new(640, 0, 1280, 1080),
            ]
        );
        assert_eq!(log.borrow().last(), Some(&Call::Close));
        assert!(driver.session().is_none());
    }

    #[test]
    fn drag_gesture_survives_a_failed_preview() {
        let (mut driver, log, calls) = Setup {
            placement_failures: 1,
            ..Setup::default()
        }
        .build();
        let host = DraggingHost {
            primary: Cell::new(true),
        };
        run_gesture(
            &mut driver,
            &host,
            vec![
                InputEvent::ButtonDown(MouseButton::Secondary, Point::new(700, 300)),
                InputEvent::ButtonUp(MouseButton::Secondary, Point::new(700, 300)),
                InputEvent::PointerMove(Point::new(1850, 1000)),
                InputEvent::ButtonUp(MouseButton::Primary, Point::new(1850, 1000)),
            ],
        );

        assert_eq!(calls.get(), 3);
        assert_eq!(places(&log), vec![Rect::new(640, 0, 1280, 1080), Rect::new(640, 0, 1280, 1080)]);
        assert_eq!(log.borrow().last(), Some(&Call::Close));
    }
}
