//! Per-client drawing tool: mode, parameters and the in-progress gesture.
//!
//! Nothing here is replicated. Parameters are restored from local
//! preferences at startup and written back by every setter.

mod gesture;

pub use gesture::{Capture, GestureMachine, GestureState};

use std::str::FromStr;
use std::sync::Arc;

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::entity::{Draft, EntityKind, Geometry, StrokeSpec};
use crate::geometry::{DisplayList, LineStyle, ParseError, Rgba, Symbol, SymbolSize};
use crate::grid::GridDescriptor;
use crate::identity::UserId;
use crate::storage::{PreferenceStore, Preferences};

pub const MIN_BRUSH_WIDTH: f64 = 1.0;
pub const MAX_BRUSH_WIDTH: f64 = 20.0;
pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;

/// Drags shorter than this are discarded.
const MIN_DRAG_EXTENT: f64 = 1e-6;

/// Drawing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    #[default]
    Sketch,
    Line,
    Box,
    Ellipse,
    Stamp,
}

impl ToolMode {
    pub const ALL: [ToolMode; 5] = [
        ToolMode::Sketch,
        ToolMode::Line,
        ToolMode::Box,
        ToolMode::Ellipse,
        ToolMode::Stamp,
    ];

    pub fn entity_kind(self) -> EntityKind {
        match self {
            ToolMode::Sketch => EntityKind::Sketch,
            ToolMode::Line => EntityKind::Line,
            ToolMode::Box => EntityKind::Box,
            ToolMode::Ellipse => EntityKind::Ellipse,
            ToolMode::Stamp => EntityKind::Stamp,
        }
    }
}

impl FromStr for ToolMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolMode::ALL
            .into_iter()
            .find(|mode| mode.entity_kind().as_str() == s)
            .ok_or_else(|| ParseError::new("tool mode", s))
    }
}

fn clamp_width(width: f64) -> Option<f64> {
    width.is_finite().then(|| width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH))
}

fn clamp_opacity(opacity: f64) -> Option<f64> {
    opacity.is_finite().then(|| opacity.clamp(MIN_OPACITY, MAX_OPACITY))
}

/// Tool state for one user on one client.
pub struct ToolSession {
    user: UserId,
    prefs: Preferences,
    permanent_mode: bool,
    store: Arc<dyn PreferenceStore>,
    gesture: GestureMachine,
    completed: Vec<Draft>,
}

impl ToolSession {
    /// Restore the user's tool settings. Unreadable preferences fall back to defaults.
    pub fn new(user: impl Into<UserId>, store: Arc<dyn PreferenceStore>) -> Self {
        let user = user.into();
        let mut prefs = match store.load(&user) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Preferences::default(),
            Err(e) => {
                log::warn!("failed to load tool preferences for {}: {}", user, e);
                Preferences::default()
            }
        };
        let defaults = Preferences::default();
        prefs.brush_width = clamp_width(prefs.brush_width).unwrap_or(defaults.brush_width);
        prefs.opacity = clamp_opacity(prefs.opacity).unwrap_or(defaults.opacity);

        Self {
            user,
            prefs,
            permanent_mode: false,
            store,
            gesture: GestureMachine::new(),
            completed: Vec::new(),
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn mode(&self) -> ToolMode {
        self.prefs.mode
    }

    pub fn permanent_mode(&self) -> bool {
        self.permanent_mode
    }

    pub fn timed_erase(&self) -> bool {
        self.prefs.timed_erase
    }

    pub fn gesture(&self) -> &GestureMachine {
        &self.gesture
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.user, &self.prefs) {
            log::warn!("failed to save tool preferences for {}: {}", self.user, e);
        }
    }

    /// Switch modes, ending any running gesture first.
    pub fn set_mode(&mut self, mode: ToolMode) {
        if mode != self.prefs.mode {
            if let Some(capture) = self.gesture.switch_mode() {
                self.complete(capture);
            }
            self.prefs.mode = mode;
        }
        self.persist();
    }

    pub fn set_stamp_style(&mut self, symbol: Symbol) {
        self.prefs.stamp_style = symbol;
        self.persist();
    }

    pub fn set_symbol_size(&mut self, size: SymbolSize) {
        self.prefs.symbol_size = size;
        self.persist();
    }

    pub fn set_line_style(&mut self, style: LineStyle) {
        self.prefs.line_style = style;
        self.persist();
    }

    /// Clamped to `[MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH]`. Non-finite values are ignored.
    pub fn set_brush_width(&mut self, width: f64) {
        match clamp_width(width) {
            Some(width) => {
                self.prefs.brush_width = width;
                self.persist();
            }
            None => log::debug!("ignoring brush width {}", width),
        }
    }

    pub fn set_brush_color(&mut self, color: Rgba) {
        self.prefs.brush_color = color;
        self.persist();
    }

    /// Clamped to `[MIN_OPACITY, MAX_OPACITY]`. Non-finite values are ignored.
    pub fn set_opacity(&mut self, opacity: f64) {
        match clamp_opacity(opacity) {
            Some(opacity) => {
                self.prefs.opacity = opacity;
                self.persist();
            }
            None => log::debug!("ignoring opacity {}", opacity),
        }
    }

    /// Permanent mode only takes effect for privileged users; it is not persisted.
    pub fn set_permanent_mode(&mut self, enabled: bool) {
        self.permanent_mode = enabled;
    }

    pub fn set_timed_erase(&mut self, enabled: bool) {
        self.prefs.timed_erase = enabled;
        self.persist();
    }

    pub fn activate(&mut self) {
        self.gesture.activate();
    }

    pub fn deactivate(&mut self) {
        if let Some(capture) = self.gesture.deactivate() {
            self.complete(capture);
        }
    }

    pub fn arm(&mut self) {
        self.gesture.arm();
    }

    pub fn disarm(&mut self) {
        if let Some(capture) = self.gesture.disarm() {
            self.complete(capture);
        }
    }

    /// Drop the running gesture without committing it.
    pub fn cancel(&mut self) {
        self.gesture.cancel();
    }

    pub fn pointer_down(&mut self, point: Point) {
        if let Some(capture) = self.gesture.pointer_down(self.prefs.mode, point) {
            self.complete(capture);
        }
    }

    pub fn pointer_move(&mut self, point: Point) {
        if let Some(capture) = self.gesture.pointer_move(self.prefs.mode, point) {
            self.complete(capture);
        }
    }

    pub fn pointer_up(&mut self, point: Point) {
        if let Some(capture) = self.gesture.pointer_up(self.prefs.mode, point) {
            self.complete(capture);
        }
    }

    /// Drafts finished since the last call, oldest first.
    pub fn take_completed(&mut self) -> Vec<Draft> {
        std::mem::take(&mut self.completed)
    }

    fn stroke(&self) -> StrokeSpec {
        StrokeSpec {
            width: self.prefs.brush_width,
            color: self.prefs.brush_color,
            line_style: self.prefs.line_style,
        }
    }

    fn draft(&self, geometry: Geometry) -> Draft {
        let mut stroke = self.stroke();
        if matches!(geometry, Geometry::Stamp { .. }) {
            stroke.line_style = LineStyle::Solid;
        }
        Draft {
            geometry,
            stroke,
            opacity: self.prefs.opacity,
        }
    }

    fn stamp_geometry(&self, center: Point) -> Geometry {
        Geometry::Stamp {
            symbol_type: self.prefs.stamp_style,
            center,
            symbol_size: self.prefs.symbol_size,
        }
    }

    fn complete(&mut self, capture: Capture) {
        let geometry = match capture {
            Capture::Stroke { origin, points } => {
                if points.len() < 2 {
                    log::debug!("discarding sketch with {} samples", points.len());
                    return;
                }
                Geometry::Sketch { origin, points }
            }
            Capture::Drag { kind, origin, end } => {
                if origin.distance(end) < MIN_DRAG_EXTENT {
                    log::debug!("discarding zero-extent {}", kind.as_str());
                    return;
                }
                let Some(geometry) = Geometry::spanning(kind, origin, end) else {
                    return;
                };
                geometry
            }
            Capture::Stamp { at } => self.stamp_geometry(at),
        };
        self.completed.push(self.draft(geometry));
    }

    /// The uncommitted draft for the running gesture or stamp ghost, if any.
    pub fn preview_draft(&self) -> Option<Draft> {
        let geometry = match self.gesture.state() {
            GestureState::Sampling { origin, points, .. } => Geometry::Sketch {
                origin: *origin,
                points: points.clone(),
            },
            GestureState::Previewing { kind, origin, last } => Geometry::spanning(*kind, *origin, *last)?,
            _ => self.stamp_geometry(self.gesture.ghost(self.prefs.mode)?),
        };
        Some(self.draft(geometry))
    }

    /// Live preview with the lighter preview shadow.
    pub fn preview(&self, grid: &GridDescriptor) -> DisplayList {
        self.preview_draft()
            .map(|draft| draft.render_preview(grid))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPreferences;

    fn session() -> (ToolSession, Arc<MemoryPreferences>) {
        let store = Arc::new(MemoryPreferences::new());
        (ToolSession::new("p1", store.clone()), store)
    }

    fn armed(mode: ToolMode) -> ToolSession {
        let (mut tools, _) = session();
        tools.set_mode(mode);
        tools.activate();
        tools.arm();
        tools
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ellipse".parse::<ToolMode>().unwrap(), ToolMode::Ellipse);
        assert!("laser".parse::<ToolMode>().is_err());
    }

    #[test]
    fn test_brush_width_clamps() {
        let (mut tools, _) = session();
        tools.set_brush_width(0.0);
        assert_eq!(tools.preferences().brush_width, MIN_BRUSH_WIDTH);
        tools.set_brush_width(1000.0);
        assert_eq!(tools.preferences().brush_width, MAX_BRUSH_WIDTH);
        tools.set_brush_width(f64::NAN);
        assert_eq!(tools.preferences().brush_width, MAX_BRUSH_WIDTH);
    }

    #[test]
    fn test_opacity_clamps() {
        let (mut tools, _) = session();
        tools.set_opacity(0.0);
        assert_eq!(tools.preferences().opacity, MIN_OPACITY);
        tools.set_opacity(5.0);
        assert_eq!(tools.preferences().opacity, MAX_OPACITY);
    }

    #[test]
    fn test_setters_persist() {
        let (mut tools, store) = session();
        tools.set_mode(ToolMode::Stamp);
        tools.set_stamp_style(Symbol::ArrowLeft);
        tools.set_symbol_size(SymbolSize::Small);
        tools.set_line_style(LineStyle::Dashed);
        tools.set_brush_color(Rgba::BLACK);
        tools.set_timed_erase(false);
        tools.set_permanent_mode(true);

        let saved = store.load("p1").unwrap().unwrap();
        assert_eq!(saved.mode, ToolMode::Stamp);
        assert_eq!(saved.stamp_style, Symbol::ArrowLeft);
        assert_eq!(saved.symbol_size, SymbolSize::Small);
        assert_eq!(saved.line_style, LineStyle::Dashed);
        assert_eq!(saved.brush_color, Rgba::BLACK);
        assert!(!saved.timed_erase);

        let restored = ToolSession::new("p1", store);
        assert_eq!(restored.preferences(), &saved);
        assert!(!restored.permanent_mode());
    }

    #[test]
    fn test_restore_clamps_stored_values() {
        let store = Arc::new(MemoryPreferences::new());
        let prefs = Preferences {
            brush_width: 400.0,
            opacity: f64::NAN,
            ..Preferences::default()
        };
        store.save("p1", &prefs).unwrap();
        let tools = ToolSession::new("p1", store);
        assert_eq!(tools.preferences().brush_width, MAX_BRUSH_WIDTH);
        assert_eq!(tools.preferences().opacity, Preferences::default().opacity);
    }

    #[test]
    fn test_sketch_draft() {
        let mut tools = armed(ToolMode::Sketch);
        tools.set_brush_width(6.0);
        tools.set_brush_color(Rgba::BLACK);
        tools.set_line_style(LineStyle::Solid);
        for (x, y) in [(50.0, 50.0), (60.0, 50.0), (60.0, 60.0)] {
            tools.pointer_move(Point::new(x, y));
        }
        assert!(!tools.preview(&GridDescriptor::default()).is_empty());
        tools.pointer_up(Point::new(60.0, 60.0));

        let drafts = tools.take_completed();
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].geometry,
            Geometry::Sketch {
                origin: Point::new(50.0, 50.0),
                points: vec![Point::ZERO, Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            }
        );
        assert_eq!(drafts[0].stroke.width, 6.0);
        assert_eq!(drafts[0].stroke.color, Rgba::BLACK);
        assert!(tools.take_completed().is_empty());
    }

    #[test]
    fn test_single_sample_sketch_is_discarded() {
        let mut tools = armed(ToolMode::Sketch);
        tools.pointer_down(Point::new(5.0, 5.0));
        tools.pointer_up(Point::new(5.0, 5.0));
        assert!(tools.take_completed().is_empty());
    }

    #[test]
    fn test_zero_extent_box_is_discarded() {
        let mut tools = armed(ToolMode::Box);
        tools.pointer_down(Point::new(5.0, 5.0));
        tools.deactivate();
        assert!(tools.take_completed().is_empty());
    }

    #[test]
    fn test_box_completes_on_deactivate() {
        let mut tools = armed(ToolMode::Box);
        tools.pointer_down(Point::new(150.0, 130.0));
        tools.pointer_move(Point::new(100.0, 100.0));
        tools.pointer_up(Point::new(100.0, 100.0));
        assert!(tools.take_completed().is_empty());

        tools.deactivate();
        let drafts = tools.take_completed();
        assert_eq!(
            drafts[0].geometry,
            Geometry::Box {
                origin: Point::new(100.0, 100.0),
                width: 50.0,
                height: 30.0,
            }
        );
    }

    #[test]
    fn test_stamp_ghost_and_commit() {
        let mut tools = armed(ToolMode::Stamp);
        tools.set_stamp_style(Symbol::Dot);
        tools.set_line_style(LineStyle::Dotted);
        tools.pointer_move(Point::new(20.0, 20.0));
        assert!(matches!(
            tools.preview_draft().map(|d| d.geometry),
            Some(Geometry::Stamp { symbol_type: Symbol::Dot, .. })
        ));

        tools.pointer_down(Point::new(20.0, 20.0));
        tools.pointer_down(Point::new(40.0, 20.0));
        let drafts = tools.take_completed();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].stroke.line_style, LineStyle::Solid);

        tools.disarm();
        assert!(tools.preview_draft().is_none());
    }

    #[test]
    fn test_mode_switch_completes_drag() {
        let mut tools = armed(ToolMode::Line);
        tools.pointer_move(Point::new(0.0, 0.0));
        tools.pointer_move(Point::new(10.0, 0.0));
        tools.set_mode(ToolMode::Sketch);
        let drafts = tools.take_completed();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].geometry.kind(), EntityKind::Line);
    }
}
