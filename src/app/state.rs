//! Gesture state machine
//!
//! Runs on the hook thread and decides, for each raw input event, whether it
//! passes through to the rest of the system and which commands the UI thread
//! has to carry out. It performs no OS calls itself: the few questions it has
//! to ask the host go through [`HostProbe`], and side effects are returned as
//! [`Command`] values.
//!
//! Only the secondary button is ever swallowed. Every secondary-button-down
//! that the machine handles is followed by exactly one swallowed
//! secondary-button-up; the suppress flag never carries over to a second up.

use crate::domain::core::{Point, WindowId};
use crate::input::events::{InputEvent, MouseButton};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Host queries the machine needs while deciding
pub trait HostProbe {
    /// Direct OS query of the primary button state
    fn primary_button_down(&self) -> bool;

    /// Top-level window being dragged at `point`, excluding our own windows
    fn resolve_target(&self, point: Point) -> Option<WindowId>;

    /// Whether `window` is inside a native move/size loop
    fn is_in_move_size_loop(&self, window: WindowId) -> bool;
}

/// Outcome for one input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the event continue down the hook chain
    PassThrough,
    /// Swallow; the matching secondary-up must be swallowed too
    HandledSuppressNextUp,
    /// Swallow; a suppression was already pending
    HandledAlreadySuppressing,
}

impl Decision {
    pub fn swallows(&self) -> bool {
        !matches!(self, Decision::PassThrough)
    }
}

/// Shared liveness flags between the hook-side gesture and the UI-side session
///
/// The UI clears `alive` when the session ends or fails so the hook stops
/// treating input as part of a gesture.
#[derive(Debug, Clone)]
pub struct SessionLink {
    inner: Arc<LinkFlags>,
}

#[derive(Debug)]
struct LinkFlags {
    alive: AtomicBool,
    selecting: AtomicBool,
}

impl SessionLink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LinkFlags {
                alive: AtomicBool::new(true),
                selecting: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Marks the session as over; idempotent
    pub fn close(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    pub fn is_selecting(&self) -> bool {
        self.inner.selecting.load(Ordering::Acquire)
    }

    pub fn mark_selecting(&self) {
        self.inner.selecting.store(true, Ordering::Release);
    }
}

impl Default for SessionLink {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SessionLink {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SessionLink {}

/// Side effects requested by the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Cancel the native drag; must run on the hook thread before returning
    BreakDrag(WindowId),
    /// Restore the target, open the overlay and start selecting at `point`
    BeginSession {
        target: WindowId,
        point: Point,
        link: SessionLink,
    },
    StartSelection(Point),
    UpdatePointer(Point),
    /// Commit the selection and close the overlay
    FinishAndClose,
}

/// Hook-side view of the running gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGesture {
    pub target: WindowId,
    pub link: SessionLink,
}

/// Result of feeding one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub decision: Decision,
    pub commands: Vec<Command>,
}

impl Transition {
    fn pass() -> Self {
        Self {
            decision: Decision::PassThrough,
            commands: Vec::new(),
        }
    }
}

/// Input interception state machine
#[derive(Debug)]
pub struct GestureMachine {
    primary_down: bool,
    suppress_next_secondary_up: bool,
    held_trigger_keys: HashSet<u32>,
    last_point: Point,
    active: Option<ActiveGesture>,
}

impl GestureMachine {
    /// Creates a machine with the primary button state seeded from the host
    pub fn new(probe: &impl HostProbe) -> Self {
        Self {
            primary_down: probe.primary_button_down(),
            suppress_next_secondary_up: false,
            held_trigger_keys: HashSet::new(),
            last_point: Point::default(),
            active: None,
        }
    }

    pub fn active(&self) -> Option<&ActiveGesture> {
        self.active.as_ref()
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_next_secondary_up
    }

    /// Processes one event in arrival order
    pub fn handle(&mut self, event: InputEvent, probe: &impl HostProbe) -> Transition {
        self.reap_dead_session();
        if let Some(point) = event.point() {
            self.last_point = point;
        }

        match event {
            InputEvent::PointerMove(point) => match &self.active {
                Some(_) => Transition {
                    decision: Decision::PassThrough,
                    commands: vec![Command::UpdatePointer(point)],
                },
                None => Transition::pass(),
            },
            InputEvent::ButtonDown(MouseButton::Primary, _) => {
                self.primary_down = true;
                Transition::pass()
            }
            InputEvent::ButtonUp(MouseButton::Primary, _) => {
                self.primary_down = false;
                match self.active.take() {
                    Some(gesture) => {
                        gesture.link.close();
                        Transition {
                            decision: Decision::PassThrough,
                            commands: vec![Command::FinishAndClose],
                        }
                    }
                    None => Transition::pass(),
                }
            }
            InputEvent::ButtonDown(MouseButton::Secondary, point) => {
                let Some(commands) = self.trigger(point, probe) else {
                    return Transition::pass();
                };
                let decision = if self.suppress_next_secondary_up {
                    Decision::HandledAlreadySuppressing
                } else {
                    Decision::HandledSuppressNextUp
                };
                self.suppress_next_secondary_up = true;
                Transition { decision, commands }
            }
            InputEvent::ButtonUp(MouseButton::Secondary, _) => {
                if self.suppress_next_secondary_up {
                    self.suppress_next_secondary_up = false;
                    return Transition {
                        decision: Decision::HandledAlreadySuppressing,
                        commands: Vec::new(),
                    };
                }
                Transition::pass()
            }
            InputEvent::TriggerKeyDown(vk) => {
                // Auto-repeat delivers repeated downs without ups
                if !self.held_trigger_keys.insert(vk) {
                    return Transition::pass();
                }
                Transition {
                    decision: Decision::PassThrough,
                    commands: self.trigger(self.last_point, probe).unwrap_or_default(),
                }
            }
            InputEvent::TriggerKeyUp(vk) => {
                self.held_trigger_keys.remove(&vk);
                Transition::pass()
            }
        }
    }

    /// Shared secondary-trigger logic; None means "not ours"
    fn trigger(&mut self, point: Point, probe: &impl HostProbe) -> Option<Vec<Command>> {
        if let Some(gesture) = &self.active {
            if gesture.link.is_selecting() {
                let gesture = self.active.take()?;
                gesture.link.close();
                return Some(vec![Command::FinishAndClose]);
            }
            gesture.link.mark_selecting();
            return Some(vec![Command::StartSelection(point)]);
        }

        let actual = probe.primary_button_down();
        if actual != self.primary_down {
            tracing::debug!(tracked = self.primary_down, actual, "Primary button state corrected");
            self.primary_down = actual;
        }
        if !self.primary_down {
            return None;
        }

        let target = probe.resolve_target(point)?;
        if !probe.is_in_move_size_loop(target) {
            tracing::trace!(%target, "Target is not in a move/size loop");
            return None;
        }

        let link = SessionLink::new();
        self.active = Some(ActiveGesture {
            target,
            link: link.clone(),
        });
        tracing::info!(%target, ?point, "Snap gesture started");
        Some(vec![
            Command::BreakDrag(target),
            Command::BeginSession { target, point, link },
        ])
    }

    /// Drops the gesture if the UI side ended it
    fn reap_dead_session(&mut self) {
        if self.active.as_ref().is_some_and(|g| !g.link.is_alive()) {
            tracing::debug!("Session ended on the UI side, releasing gesture");
            self.active = None;
        }
    }
}
