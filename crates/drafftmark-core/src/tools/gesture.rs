//! Pointer gesture state machine.
//!
//! A gesture only runs while the tool is active *and* armed (an external
//! modifier is held). Every way out of a running gesture goes through
//! [`GestureState::Completing`] or an explicit cancel.

use kurbo::Point;

use super::ToolMode;
use crate::entity::EntityKind;

/// Result of a finished gesture, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    /// Freehand samples as offsets from `origin`.
    Stroke { origin: Point, points: Vec<Point> },
    /// Two-point drag for line, box or ellipse.
    Drag {
        kind: EntityKind,
        origin: Point,
        end: Point,
    },
    Stamp { at: Point },
}

/// Gesture state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    /// Tool inactive or not armed.
    #[default]
    Idle,
    /// Armed and waiting for the first pointer sample.
    Arming,
    /// Recording a freehand stroke.
    Sampling {
        origin: Point,
        points: Vec<Point>,
        last: Point,
    },
    /// Dragging out a line, box or ellipse; nothing is committed until completion.
    Previewing {
        kind: EntityKind,
        origin: Point,
        last: Point,
    },
    /// Gesture ended; holds the capture until the machine settles.
    Completing(Capture),
}

/// Terminal transition applied to a running gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    /// Disarm or pointer-up: every running gesture completes.
    Release,
    /// Deactivation: drags complete, sketches are discarded.
    Deactivate,
}

#[derive(Debug, Clone, Default)]
pub struct GestureMachine {
    state: GestureState,
    active: bool,
    armed: bool,
    pointer: Option<Point>,
}

impl GestureMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether a sketch or drag is running.
    pub fn in_progress(&self) -> bool {
        matches!(
            self.state,
            GestureState::Sampling { .. } | GestureState::Previewing { .. }
        )
    }

    /// Position of the stamp ghost, if one should be shown.
    pub fn ghost(&self, mode: ToolMode) -> Option<Point> {
        (mode == ToolMode::Stamp && self.active && self.armed)
            .then_some(self.pointer)
            .flatten()
    }

    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        if self.armed {
            self.state = GestureState::Arming;
        }
    }

    pub fn deactivate(&mut self) -> Option<Capture> {
        if !self.active {
            return None;
        }
        let capture = self.finish(Finish::Deactivate);
        self.active = false;
        self.state = GestureState::Idle;
        capture
    }

    pub fn arm(&mut self) {
        if self.armed {
            return;
        }
        self.armed = true;
        if self.active && self.state == GestureState::Idle {
            self.state = GestureState::Arming;
        }
    }

    pub fn disarm(&mut self) -> Option<Capture> {
        if !self.armed {
            return None;
        }
        let capture = self.finish(Finish::Release);
        self.armed = false;
        self.pointer = None;
        self.state = GestureState::Idle;
        capture
    }

    /// Abandon the current gesture without producing anything.
    pub fn cancel(&mut self) {
        if self.in_progress() {
            log::debug!("gesture cancelled");
        }
        self.state = if self.active && self.armed {
            GestureState::Arming
        } else {
            GestureState::Idle
        };
    }

    /// Changing modes ends a running gesture the same way deactivation does.
    pub fn switch_mode(&mut self) -> Option<Capture> {
        self.finish(Finish::Deactivate)
    }

    /// Pointer moved.
    pub fn pointer_move(&mut self, mode: ToolMode, point: Point) -> Option<Capture> {
        self.pointer = Some(point);
        self.sample(mode, point);
        None
    }

    /// Pointer pressed. Stamps commit here.
    pub fn pointer_down(&mut self, mode: ToolMode, point: Point) -> Option<Capture> {
        self.pointer = Some(point);
        if mode == ToolMode::Stamp {
            if self.state == GestureState::Arming {
                self.state = GestureState::Completing(Capture::Stamp { at: point });
                return self.settle();
            }
            return None;
        }
        self.sample(mode, point);
        None
    }

    /// Pointer released. Completes a sketch; drags ignore it.
    pub fn pointer_up(&mut self, _mode: ToolMode, point: Point) -> Option<Capture> {
        self.pointer = Some(point);
        if matches!(self.state, GestureState::Sampling { .. }) {
            return self.finish(Finish::Release);
        }
        None
    }

    fn sample(&mut self, mode: ToolMode, point: Point) {
        if self.state == GestureState::Arming {
            match mode {
                ToolMode::Sketch => {
                    self.state = GestureState::Sampling {
                        origin: point,
                        points: vec![Point::ZERO],
                        last: point,
                    };
                }
                ToolMode::Line | ToolMode::Box | ToolMode::Ellipse => {
                    self.state = GestureState::Previewing {
                        kind: mode.entity_kind(),
                        origin: point,
                        last: point,
                    };
                }
                ToolMode::Stamp => {}
            }
            return;
        }
        match &mut self.state {
            GestureState::Sampling { origin, points, last } => {
                if point != *last {
                    points.push((point - *origin).to_point());
                    *last = point;
                }
            }
            GestureState::Previewing { last, .. } => *last = point,
            GestureState::Idle | GestureState::Arming | GestureState::Completing(_) => {}
        }
    }

    fn finish(&mut self, how: Finish) -> Option<Capture> {
        let capture = match std::mem::take(&mut self.state) {
            GestureState::Sampling { origin, points, .. } => match how {
                Finish::Release => Some(Capture::Stroke { origin, points }),
                Finish::Deactivate => {
                    log::debug!("sketch cancelled by deactivation");
                    None
                }
            },
            GestureState::Previewing { kind, origin, last } => Some(Capture::Drag {
                kind,
                origin,
                end: last,
            }),
            other => {
                self.state = other;
                return None;
            }
        };
        match capture {
            Some(capture) => {
                self.state = GestureState::Completing(capture);
                self.settle()
            }
            None => {
                self.cancel();
                None
            }
        }
    }

    /// Leave `Completing`, handing out the capture.
    fn settle(&mut self) -> Option<Capture> {
        let next = if self.active && self.armed {
            GestureState::Arming
        } else {
            GestureState::Idle
        };
        match std::mem::replace(&mut self.state, next) {
            GestureState::Completing(capture) => Some(capture),
            _ => None,
        }
    }
}
