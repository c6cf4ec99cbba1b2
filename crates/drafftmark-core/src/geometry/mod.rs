//! Geometry engine: coordinate mapping and rendering of marks into display lists.
//!
//! Everything here is a pure function over points. The output is a
//! [`DisplayList`] of stroke and fill primitives which the host surface
//! (see the render crate) encodes for the GPU.

mod hex;
mod stamp;
mod stroke;

pub use hex::{cluster_cells, hex_cluster_outline, single_hex};
pub use stamp::{Symbol, SymbolSize, render_stamp};
pub use stroke::{
    DASH_RATIO, DOT_PITCH_RATIO, DOT_RADIUS_RATIO, ELLIPSE_SEGMENTS, GAP_RATIO, render_box,
    render_ellipse, render_stroke,
};

use std::fmt;
use std::str::FromStr;

use kurbo::{Affine, BezPath, Point, Rect, Shape as _, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Offset of the drop shadow drawn under every primitive.
pub const SHADOW_OFFSET: Vec2 = Vec2::new(2.0, 2.0);

/// Shadow opacity for committed drawings.
pub const SHADOW_ALPHA: f64 = 0.3;

/// Shadow opacity for live previews.
pub const PREVIEW_SHADOW_ALPHA: f64 = 0.15;

/// Error returned when a tool domain value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {domain}: {value:?}")]
pub struct ParseError {
    pub domain: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(domain: &'static str, value: &str) -> Self {
        Self {
            domain,
            value: value.to_string(),
        }
    }
}

/// Map a device-space sample through a view transform into world space.
///
/// Returns `None` for a singular or non-finite transform, or a non-finite sample.
pub fn world_coordinates(view: Affine, sample: Point) -> Option<Point> {
    if !view.as_coeffs().iter().all(|c| c.is_finite()) || view.determinant().abs() < f64::EPSILON {
        return None;
    }
    let world = view.inverse() * sample;
    (world.x.is_finite() && world.y.is_finite()).then_some(world)
}

/// RGBA8 color, serialized as `#rrggbb` (or `#rrggbbaa` when translucent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const RED: Rgba = Rgba::rgb(255, 0, 0);
    pub const HIGHLIGHT: Rgba = Rgba::rgb(59, 130, 246);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Rgba {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::new("color", s);
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<Rgba> for Color {
    fn from(color: Rgba) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Line style of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dotted,
    Dashed,
}

impl LineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dotted => "dotted",
            LineStyle::Dashed => "dashed",
        }
    }
}

impl FromStr for LineStyle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(LineStyle::Solid),
            "dotted" => Ok(LineStyle::Dotted),
            "dashed" => Ok(LineStyle::Dashed),
            _ => Err(ParseError::new("line style", s)),
        }
    }
}

/// One drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Stroke a path with the given width.
    Stroke {
        path: BezPath,
        width: f64,
        color: Rgba,
        alpha: f64,
    },
    /// Fill a path (non-zero winding).
    Fill { path: BezPath, color: Rgba, alpha: f64 },
}

impl Primitive {
    pub fn stroke(path: BezPath, width: f64, color: Rgba) -> Self {
        Primitive::Stroke {
            path,
            width,
            color,
            alpha: 1.0,
        }
    }

    pub fn fill(path: BezPath, color: Rgba) -> Self {
        Primitive::Fill {
            path,
            color,
            alpha: 1.0,
        }
    }

    pub fn path(&self) -> &BezPath {
        match self {
            Primitive::Stroke { path, .. } | Primitive::Fill { path, .. } => path,
        }
    }

    pub(crate) fn path_mut(&mut self) -> &mut BezPath {
        match self {
            Primitive::Stroke { path, .. } | Primitive::Fill { path, .. } => path,
        }
    }

    pub fn alpha(&self) -> f64 {
        match self {
            Primitive::Stroke { alpha, .. } | Primitive::Fill { alpha, .. } => *alpha,
        }
    }

    /// Multiply this primitive's alpha by `factor`.
    pub fn fade(mut self, factor: f64) -> Self {
        match &mut self {
            Primitive::Stroke { alpha, .. } | Primitive::Fill { alpha, .. } => *alpha *= factor,
        }
        self
    }

    /// Shadow copy: offset by [`SHADOW_OFFSET`], painted black at `alpha`.
    pub fn shadow(&self, alpha: f64) -> Self {
        let mut shadow = self.clone();
        match &mut shadow {
            Primitive::Stroke {
                path,
                color,
                alpha: a,
                ..
            }
            | Primitive::Fill {
                path,
                color,
                alpha: a,
            } => {
                path.apply_affine(Affine::translate(SHADOW_OFFSET));
                *color = Rgba::BLACK;
                *a = alpha;
            }
        }
        shadow
    }

    /// Bounding box including half the stroke width.
    pub fn bounds(&self) -> Rect {
        match self {
            Primitive::Stroke { path, width, .. } => {
                path.bounding_box().inflate(width / 2.0, width / 2.0)
            }
            Primitive::Fill { path, .. } => path.bounding_box(),
        }
    }
}

/// Ordered list of primitives, painted back to front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    primitives: Vec<Primitive>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the two-pass list for a mark: every shadow first, then the primaries at `alpha`.
    pub fn with_shadow(primary: Vec<Primitive>, shadow_alpha: f64, alpha: f64) -> Self {
        let mut primitives: Vec<Primitive> = primary.iter().map(|p| p.shadow(shadow_alpha)).collect();
        primitives.extend(primary.into_iter().map(|p| p.fade(alpha)));
        Self { primitives }
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// Append another list, multiplying its alpha by `factor`.
    pub fn append_faded(&mut self, other: &DisplayList, factor: f64) {
        self.primitives
            .extend(other.primitives.iter().cloned().map(|p| p.fade(factor)));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Union of all primitive bounds, `None` when empty.
    pub fn bounds(&self) -> Option<Rect> {
        self.primitives
            .iter()
            .map(Primitive::bounds)
            .reduce(|a, b| a.union(b))
    }
}

impl<'a> IntoIterator for &'a DisplayList {
    type Item = &'a Primitive;
    type IntoIter = std::slice::Iter<'a, Primitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.primitives.iter()
    }
}
