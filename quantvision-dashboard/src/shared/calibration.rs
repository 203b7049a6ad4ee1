//! Drag-to-select calibration of the vision capture region
//!
//! `IDLE -> ARMED -> DRAGGING -> SUBMITTING -> IDLE`
//!
//! The session is a plain state machine driven by the host's event dispatch.
//! Everything visual goes through a [`CaptureSurface`] owned by the session,
//! so the host decides what an overlay or a selection rectangle looks like.

use tracing::{debug, info, warn};

use crate::shared::types::{CalibrationRect, Point};

/// Pointer style shown while the capture surface is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerStyle {
    Default,
    Crosshair,
}

/// Host-side display hooks for a calibration session
pub trait CaptureSurface {
    /// Show a full-viewport capture layer above all other content.
    fn mount(&mut self, pointer: PointerStyle);

    /// Remove the capture layer and any selection rectangle.
    fn unmount(&mut self);

    /// Show or move the selection rectangle.
    fn draw_selection(&mut self, rect: CalibrationRect);

    /// Start routing pointer-move / pointer-up events to the session.
    fn attach_drag_listeners(&mut self);

    /// Stop routing pointer-move / pointer-up events to the session.
    fn detach_drag_listeners(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Armed,
    Dragging {
        anchor: Point,
        rect: CalibrationRect,
    },
}

/// Externally visible phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Armed,
    Dragging,
    /// No drag in progress, at least one rectangle still being submitted
    Submitting,
}

/// Result of submitting a rectangle to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    Saved(CalibrationRect),
    Failed { rect: CalibrationRect, reason: String },
}

impl CalibrationOutcome {
    /// Message shown to the operator once the submission settles.
    pub fn notice(&self) -> String {
        match self {
            CalibrationOutcome::Saved(_) => "Calibration saved".to_string(),
            CalibrationOutcome::Failed { reason, .. } => format!("Calibration failed: {reason}"),
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, CalibrationOutcome::Saved(_))
    }
}

/// Drag-to-select state machine
pub struct CalibrationSession<S> {
    surface: S,
    state: DragState,
    in_flight: usize,
}

impl<S: CaptureSurface> CalibrationSession<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: DragState::Idle,
            in_flight: 0,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        match self.state {
            DragState::Armed => CalibrationPhase::Armed,
            DragState::Dragging { .. } => CalibrationPhase::Dragging,
            DragState::Idle if self.in_flight > 0 => CalibrationPhase::Submitting,
            DragState::Idle => CalibrationPhase::Idle,
        }
    }

    /// True while the capture surface is mounted.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// In-progress selection, if dragging.
    pub fn selection(&self) -> Option<CalibrationRect> {
        match self.state {
            DragState::Dragging { rect, .. } => Some(rect),
            _ => None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Arm the session. Ignored while armed or dragging; returns whether a
    /// capture surface was mounted.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            debug!("Calibration already in progress, ignoring start");
            return false;
        }

        self.surface.mount(PointerStyle::Crosshair);
        self.state = DragState::Armed;
        info!("Calibration armed");
        true
    }

    /// Anchor the selection. Only valid while armed.
    pub fn pointer_down(&mut self, at: Point) -> bool {
        if self.state != DragState::Armed {
            return false;
        }

        let at = at.pinned();
        let rect = CalibrationRect::from_corners(at, at);
        self.surface.draw_selection(rect);
        self.surface.attach_drag_listeners();
        self.state = DragState::Dragging { anchor: at, rect };
        debug!("Calibration drag anchored at ({}, {})", at.x, at.y);
        true
    }

    /// Track the pointer. Recomputes the selection from the anchor on every call.
    pub fn pointer_move(&mut self, at: Point) -> Option<CalibrationRect> {
        let DragState::Dragging { anchor, .. } = self.state else {
            return None;
        };

        let rect = CalibrationRect::from_corners(anchor, at);
        self.surface.draw_selection(rect);
        self.state = DragState::Dragging { anchor, rect };
        Some(rect)
    }

    /// Finish the drag. Tears the surface down, frees the session for re-arming
    /// and returns the rectangle to submit.
    pub fn pointer_up(&mut self, at: Point) -> Option<CalibrationRect> {
        let DragState::Dragging { anchor, .. } = self.state else {
            return None;
        };

        let rect = CalibrationRect::from_corners(anchor, at);
        self.teardown();
        self.in_flight += 1;

        info!("Calibration selected {}", rect);
        Some(rect)
    }

    /// Drop an armed or dragging session without submitting anything.
    pub fn abort(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }

        self.teardown();
        info!("Calibration aborted");
        true
    }

    /// Record a settled submission and return the operator notice for it.
    pub fn complete_submission(&mut self, outcome: &CalibrationOutcome) -> String {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            CalibrationOutcome::Saved(rect) => info!("Calibration {} saved", rect),
            CalibrationOutcome::Failed { rect, reason } => {
                warn!("Calibration {} failed: {}", rect, reason)
            }
        }

        outcome.notice()
    }

    fn teardown(&mut self) {
        if matches!(self.state, DragState::Dragging { .. }) {
            self.surface.detach_drag_listeners();
        }
        self.surface.unmount();
        self.state = DragState::Idle;
    }
}
