//! Vector entities: the immutable drawings replicated between clients.

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Millis;
use crate::geometry::{
    DisplayList, LineStyle, PREVIEW_SHADOW_ALPHA, Primitive, Rgba, SHADOW_ALPHA, Symbol,
    SymbolSize, render_box, render_ellipse, render_stamp, render_stroke,
};
use crate::grid::GridDescriptor;
use crate::identity::{User, UserId};
use crate::tools::{MAX_BRUSH_WIDTH, MAX_OPACITY, MIN_BRUSH_WIDTH, MIN_OPACITY};

/// Largest coordinate or extent accepted from a payload, in world pixels.
pub const MAX_COORDINATE: f64 = 1.0e6;

/// Globally unique entity identifier (`kind-millis-random`).
pub type EntityId = String;

/// Kind of a vector entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Sketch,
    Line,
    Box,
    Ellipse,
    Stamp,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Sketch => "sketch",
            EntityKind::Line => "line",
            EntityKind::Box => "box",
            EntityKind::Ellipse => "ellipse",
            EntityKind::Stamp => "stamp",
        }
    }
}

/// Generate a fresh entity id.
pub fn generate_id(kind: EntityKind, now: Millis) -> EntityId {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", kind.as_str(), now, &random[..8])
}

/// Kind-specific geometry, discriminated by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Geometry {
    /// Freehand polyline; `points` are offsets from `origin`.
    Sketch { origin: Point, points: Vec<Point> },
    /// Straight segment; `points` are offsets from `origin`.
    Line { origin: Point, points: Vec<Point> },
    /// Box with top-left `origin`.
    Box {
        origin: Point,
        width: f64,
        height: f64,
    },
    /// Ellipse inscribed in the box with top-left `origin`.
    Ellipse {
        origin: Point,
        width: f64,
        height: f64,
    },
    Stamp {
        symbol_type: Symbol,
        center: Point,
        symbol_size: SymbolSize,
    },
}

impl Geometry {
    pub fn kind(&self) -> EntityKind {
        match self {
            Geometry::Sketch { .. } => EntityKind::Sketch,
            Geometry::Line { .. } => EntityKind::Line,
            Geometry::Box { .. } => EntityKind::Box,
            Geometry::Ellipse { .. } => EntityKind::Ellipse,
            Geometry::Stamp { .. } => EntityKind::Stamp,
        }
    }

    /// Every coordinate and extent is finite and within [`MAX_COORDINATE`].
    pub fn is_bounded(&self) -> bool {
        let bounded = |v: f64| v.is_finite() && v.abs() <= MAX_COORDINATE;
        let point = |p: &Point| bounded(p.x) && bounded(p.y);
        match self {
            Geometry::Sketch { origin, points } | Geometry::Line { origin, points } => {
                point(origin) && points.iter().all(|p| point(p) && point(&(*origin + p.to_vec2())))
            }
            Geometry::Box { origin, width, height } | Geometry::Ellipse { origin, width, height } => {
                point(origin) && bounded(*width) && bounded(*height)
            }
            Geometry::Stamp { center, .. } => point(center),
        }
    }

    /// Box or ellipse geometry spanning two corners, normalized to a top-left origin.
    pub fn spanning(kind: EntityKind, a: Point, b: Point) -> Option<Self> {
        let rect = Rect::from_points(a, b);
        let (origin, width, height) = (rect.origin(), rect.width(), rect.height());
        match kind {
            EntityKind::Box => Some(Geometry::Box { origin, width, height }),
            EntityKind::Ellipse => Some(Geometry::Ellipse { origin, width, height }),
            EntityKind::Line => Some(Geometry::Line {
                origin: a,
                points: vec![Point::ZERO, (b - a).to_point()],
            }),
            EntityKind::Sketch | EntityKind::Stamp => None,
        }
    }

    /// Primary primitives for this geometry (no shadow).
    pub fn render(&self, stroke: &StrokeSpec, grid: &GridDescriptor) -> Vec<Primitive> {
        match self {
            Geometry::Sketch { origin, points } | Geometry::Line { origin, points } => {
                render_stroke(points, *origin, stroke.width, stroke.color, stroke.line_style)
            }
            Geometry::Box { origin, width, height } => render_box(
                *origin,
                Size::new(*width, *height),
                stroke.width,
                stroke.color,
                stroke.line_style,
            ),
            Geometry::Ellipse { origin, width, height } => render_ellipse(
                *origin,
                Size::new(*width, *height),
                stroke.width,
                stroke.color,
                stroke.line_style,
            ),
            Geometry::Stamp {
                symbol_type,
                center,
                symbol_size,
            } => render_stamp(*symbol_type, *center, *symbol_size, stroke.width, stroke.color, grid),
        }
    }
}

/// Stroke parameters shared by every kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeSpec {
    #[serde(rename = "strokeWidth")]
    pub width: f64,
    #[serde(rename = "strokeColor")]
    pub color: Rgba,
    #[serde(rename = "lineStyle", default)]
    pub line_style: LineStyle,
}

impl Default for StrokeSpec {
    fn default() -> Self {
        Self {
            width: 4.0,
            color: Rgba::BLACK,
            line_style: LineStyle::Solid,
        }
    }
}

/// Creator of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "ownerId")]
    pub id: UserId,
    #[serde(rename = "ownerName")]
    pub name: String,
}

impl From<&User> for Owner {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

/// A drawing that has not been committed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub geometry: Geometry,
    pub stroke: StrokeSpec,
    pub opacity: f64,
}

impl Draft {
    /// Live preview rendering, with the lighter preview shadow.
    pub fn render_preview(&self, grid: &GridDescriptor) -> DisplayList {
        DisplayList::with_shadow(self.geometry.render(&self.stroke, grid), PREVIEW_SHADOW_ALPHA, self.opacity)
    }
}

/// A committed, immutable drawing. Serializes to the `created` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorEntity {
    #[serde(rename = "entityId")]
    pub id: EntityId,
    #[serde(flatten)]
    pub owner: Owner,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(flatten)]
    pub stroke: StrokeSpec,
    pub opacity: f64,
    pub created_at: Millis,
    pub expires_at: Option<Millis>,
    #[serde(default)]
    pub permanent: bool,
}

impl VectorEntity {
    pub fn kind(&self) -> EntityKind {
        self.geometry.kind()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.id == user_id
    }

    /// Bring a received payload into the ranges local tools produce.
    ///
    /// Width and opacity are clamped like the tool setters. Returns `None`
    /// when a coordinate or extent is non-finite or beyond [`MAX_COORDINATE`].
    pub fn sanitized(mut self) -> Option<Self> {
        if !self.stroke.width.is_finite() || !self.opacity.is_finite() || !self.geometry.is_bounded() {
            return None;
        }
        self.stroke.width = self.stroke.width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
        self.opacity = self.opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        Some(self)
    }

    /// Whether this entity's expiration has passed at `now`. Permanent entities never expire.
    pub fn is_expired(&self, now: Millis) -> bool {
        !self.permanent && self.expires_at.is_some_and(|at| now >= at)
    }

    /// Committed rendering: shadow pass, then the primary pass at the entity's opacity.
    ///
    /// Built from payload fields only, so every client renders the same pixels.
    pub fn render(&self, grid: &GridDescriptor) -> DisplayList {
        DisplayList::with_shadow(self.geometry.render(&self.stroke, grid), SHADOW_ALPHA, self.opacity)
    }

    /// Painted extent of the primary pass, stroke width included.
    pub fn bounds(&self, grid: &GridDescriptor) -> Option<Rect> {
        self.geometry
            .render(&self.stroke, grid)
            .iter()
            .map(Primitive::bounds)
            .reduce(|a, b| a.union(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_box() -> VectorEntity {
        VectorEntity {
            id: "box-1-abcdef01".to_string(),
            owner: Owner {
                id: "gm".to_string(),
                name: "Game Master".to_string(),
            },
            geometry: Geometry::Box {
                origin: Point::new(100.0, 100.0),
                width: 50.0,
                height: 30.0,
            },
            stroke: StrokeSpec {
                width: 3.0,
                color: Rgba::RED,
                line_style: LineStyle::Dashed,
            },
            opacity: 0.8,
            created_at: 1,
            expires_at: None,
            permanent: true,
        }
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id(EntityKind::Stamp, 1_700_000_000_000);
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "stamp");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 8);
        assert_ne!(id, generate_id(EntityKind::Stamp, 1_700_000_000_000));
    }

    #[test]
    fn test_payload_wire_shape() {
        let value = serde_json::to_value(sample_box()).unwrap();
        assert_eq!(value["entityId"], "box-1-abcdef01");
        assert_eq!(value["ownerId"], "gm");
        assert_eq!(value["ownerName"], "Game Master");
        assert_eq!(value["kind"], "box");
        assert_eq!(value["origin"]["x"], 100.0);
        assert_eq!(value["width"], 50.0);
        assert_eq!(value["strokeColor"], "#ff0000");
        assert_eq!(value["lineStyle"], "dashed");
        assert_eq!(value["expiresAt"], serde_json::Value::Null);
        assert_eq!(value["permanent"], true);
    }

    #[test]
    fn test_stamp_payload_fields() {
        let mut entity = sample_box();
        entity.geometry = Geometry::Stamp {
            symbol_type: Symbol::HexOutline,
            center: Point::new(5.0, 6.0),
            symbol_size: SymbolSize::Large,
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains(r#""symbolType":"hex-outline""#));
        assert!(json.contains(r#""symbolSize":"large""#));
        let back: VectorEntity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_payload_without_permanent_flag() {
        let json = r##"{"entityId":"line-5-00000000","ownerId":"p1","ownerName":"Alice",
            "kind":"line","origin":{"x":1.0,"y":2.0},"points":[{"x":0.0,"y":0.0},{"x":3,"y":4}],
            "strokeWidth":2,"strokeColor":"#000000","opacity":1,"createdAt":5,"expiresAt":null}"##;
        let entity: VectorEntity = serde_json::from_str(json).unwrap();
        assert!(!entity.permanent);
        assert_eq!(entity.stroke.line_style, LineStyle::Solid);
        assert_eq!(entity.kind(), EntityKind::Line);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r##"{"entityId":"x","ownerId":"p1","ownerName":"A","kind":"polygon",
            "strokeWidth":2,"strokeColor":"#000000","opacity":1,"createdAt":5,"expiresAt":null}"##;
        assert!(serde_json::from_str::<VectorEntity>(json).is_err());
    }

    #[test]
    fn test_spanning_normalizes_corners() {
        let geometry = Geometry::spanning(EntityKind::Box, Point::new(150.0, 130.0), Point::new(100.0, 100.0)).unwrap();
        assert_eq!(
            geometry,
            Geometry::Box {
                origin: Point::new(100.0, 100.0),
                width: 50.0,
                height: 30.0
            }
        );
        assert!(Geometry::spanning(EntityKind::Stamp, Point::ZERO, Point::ZERO).is_none());
    }

    #[test]
    fn test_expiration() {
        let mut entity = sample_box();
        entity.permanent = false;
        entity.expires_at = Some(100);
        assert!(!entity.is_expired(99));
        assert!(entity.is_expired(100));
        entity.permanent = true;
        assert!(!entity.is_expired(1_000));
    }

    #[test]
    fn test_sanitized_clamps_stroke_and_opacity() {
        let mut entity = sample_box();
        entity.stroke.width = 1e-7;
        entity.opacity = 7.0;
        let entity = entity.sanitized().unwrap();
        assert_eq!(entity.stroke.width, MIN_BRUSH_WIDTH);
        assert_eq!(entity.opacity, MAX_OPACITY);

        let mut wide = sample_box();
        wide.stroke.width = 500.0;
        wide.opacity = 0.0;
        let wide = wide.sanitized().unwrap();
        assert_eq!(wide.stroke.width, MAX_BRUSH_WIDTH);
        assert_eq!(wide.opacity, MIN_OPACITY);

        assert_eq!(sample_box().sanitized(), Some(sample_box()));
    }

    #[test]
    fn test_sanitized_rejects_unbounded_geometry() {
        let mut entity = sample_box();
        entity.stroke.width = f64::NAN;
        assert!(entity.sanitized().is_none());

        let mut entity = sample_box();
        entity.geometry = Geometry::Line {
            origin: Point::ZERO,
            points: vec![Point::new(-1e300, 0.0), Point::new(1e300, 0.0)],
        };
        assert!(entity.sanitized().is_none());

        let mut entity = sample_box();
        entity.geometry = Geometry::Sketch {
            origin: Point::new(9e5, 0.0),
            points: vec![Point::ZERO, Point::new(9e5, 0.0)],
        };
        assert!(entity.sanitized().is_none());

        let mut entity = sample_box();
        entity.geometry = Geometry::Ellipse {
            origin: Point::ZERO,
            width: f64::INFINITY,
            height: 10.0,
        };
        assert!(entity.sanitized().is_none());
    }

    #[test]
    fn test_render_has_shadow_and_primary() {
        let list = sample_box().render(&GridDescriptor::default());
        // Dashed box: one dashed stroke, drawn twice.
        assert_eq!(list.len(), 2);
        let prims: Vec<_> = list.iter().collect();
        assert!((prims[0].alpha() - SHADOW_ALPHA).abs() < 1e-12);
        assert!((prims[1].alpha() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_include_stroke() {
        let mut entity = sample_box();
        entity.stroke.line_style = LineStyle::Solid;
        let bounds = entity.bounds(&GridDescriptor::default()).unwrap();
        assert_eq!(bounds, Rect::new(98.5, 98.5, 151.5, 131.5));
    }
}
