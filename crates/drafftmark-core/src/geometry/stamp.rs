//! Stamped symbols.

use std::f64::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

use kurbo::{Affine, BezPath, Circle, Point, Rect, Shape};
use serde::{Deserialize, Serialize};

use super::hex::hex_cluster_outline;
use super::stroke::render_stroke;
use super::{LineStyle, ParseError, Primitive, Rgba};
use crate::grid::GridDescriptor;

/// Symbol drawn by the stamp tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbol {
    #[default]
    Plus,
    X,
    Dot,
    Arrow,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    Square,
    HexOutline,
}

impl Symbol {
    pub const ALL: [Symbol; 9] = [
        Symbol::Plus,
        Symbol::X,
        Symbol::Dot,
        Symbol::Arrow,
        Symbol::ArrowUp,
        Symbol::ArrowDown,
        Symbol::ArrowLeft,
        Symbol::Square,
        Symbol::HexOutline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Plus => "plus",
            Symbol::X => "x",
            Symbol::Dot => "dot",
            Symbol::Arrow => "arrow",
            Symbol::ArrowUp => "arrow-up",
            Symbol::ArrowDown => "arrow-down",
            Symbol::ArrowLeft => "arrow-left",
            Symbol::Square => "square",
            Symbol::HexOutline => "hex-outline",
        }
    }
}

impl FromStr for Symbol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.as_str() == s)
            .ok_or_else(|| ParseError::new("stamp symbol", s))
    }
}

/// Size tier of a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl SymbolSize {
    /// Pixel extent of the symbol's bounding square.
    pub fn extent(self) -> f64 {
        match self {
            SymbolSize::Small => 16.0,
            SymbolSize::Medium => 28.0,
            SymbolSize::Large => 44.0,
        }
    }

    /// Number of hex rings around the center cell for `hex-outline`.
    pub fn hex_rings(self) -> usize {
        match self {
            SymbolSize::Small => 0,
            SymbolSize::Medium => 1,
            SymbolSize::Large => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolSize::Small => "small",
            SymbolSize::Medium => "medium",
            SymbolSize::Large => "large",
        }
    }
}

impl FromStr for SymbolSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(SymbolSize::Small),
            "medium" => Ok(SymbolSize::Medium),
            "large" => Ok(SymbolSize::Large),
            _ => Err(ParseError::new("symbol size", s)),
        }
    }
}

/// Draw one stamped symbol centered at `center`. Stamps are always solid.
pub fn render_stamp(
    symbol: Symbol,
    center: Point,
    size: SymbolSize,
    width: f64,
    color: Rgba,
    grid: &GridDescriptor,
) -> Vec<Primitive> {
    let half = size.extent() / 2.0;
    match symbol {
        Symbol::Plus => {
            let mut path = BezPath::new();
            path.move_to((center.x - half, center.y));
            path.line_to((center.x + half, center.y));
            path.move_to((center.x, center.y - half));
            path.line_to((center.x, center.y + half));
            vec![Primitive::stroke(path, width, color)]
        }
        Symbol::X => {
            let mut path = BezPath::new();
            path.move_to((center.x - half, center.y - half));
            path.line_to((center.x + half, center.y + half));
            path.move_to((center.x + half, center.y - half));
            path.line_to((center.x - half, center.y + half));
            vec![Primitive::stroke(path, width, color)]
        }
        Symbol::Dot => {
            let circle = Circle::new(center, half / 2.0);
            vec![Primitive::fill(circle.to_path(0.1), color)]
        }
        Symbol::Arrow => vec![arrow(center, half, 0.0, width, color)],
        Symbol::ArrowDown => vec![arrow(center, half, FRAC_PI_2, width, color)],
        Symbol::ArrowLeft => vec![arrow(center, half, PI, width, color)],
        Symbol::ArrowUp => vec![arrow(center, half, -FRAC_PI_2, width, color)],
        Symbol::Square => {
            let rect = Rect::from_center_size(center, (half * 2.0, half * 2.0));
            vec![Primitive::stroke(rect.to_path(0.1), width, color)]
        }
        Symbol::HexOutline => {
            let outline = hex_cluster_outline(center, size, grid);
            let offsets: Vec<Point> = outline.iter().map(|p| (*p - center).to_point()).collect();
            render_stroke(&offsets, center, width, color, LineStyle::Solid)
        }
    }
}

/// Right-pointing arrow rotated by `angle` (y axis points down).
fn arrow(center: Point, half: f64, angle: f64, width: f64, color: Rgba) -> Primitive {
    let head = half * 0.6;
    let mut path = BezPath::new();
    path.move_to((center.x - half, center.y));
    path.line_to((center.x + half, center.y));
    path.move_to((center.x + half - head, center.y - head));
    path.line_to((center.x + half, center.y));
    path.line_to((center.x + half - head, center.y + head));
    path.apply_affine(Affine::rotate_about(angle, center));
    Primitive::stroke(path, width, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::HexOrientation;

    #[test]
    fn test_symbol_names_roundtrip() {
        for symbol in Symbol::ALL {
            assert_eq!(symbol.as_str().parse::<Symbol>().unwrap(), symbol);
            let json = serde_json::to_string(&symbol).unwrap();
            assert_eq!(json, format!("\"{}\"", symbol.as_str()));
        }
        assert!("star".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_every_symbol_renders_within_extent() {
        let grid = GridDescriptor::default();
        let center = Point::new(200.0, 200.0);
        for symbol in Symbol::ALL {
            if symbol == Symbol::HexOutline {
                continue;
            }
            let prims = render_stamp(symbol, center, SymbolSize::Large, 2.0, Rgba::RED, &grid);
            assert!(!prims.is_empty(), "{symbol:?}");
            for prim in &prims {
                let bounds = prim.path().bounding_box();
                assert!(bounds.width() <= SymbolSize::Large.extent() + 1e-6, "{symbol:?}");
                assert!(bounds.height() <= SymbolSize::Large.extent() + 1e-6, "{symbol:?}");
            }
        }
    }

    #[test]
    fn test_arrow_up_points_up() {
        let prims = render_stamp(
            Symbol::ArrowUp,
            Point::new(0.0, 0.0),
            SymbolSize::Medium,
            2.0,
            Rgba::BLACK,
            &GridDescriptor::default(),
        );
        let bounds = prims[0].path().bounding_box();
        assert!((bounds.y0 + 14.0).abs() < 1e-9);
        assert!((bounds.y1 - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_hex_outline_scales_with_tier() {
        let grid = GridDescriptor::hex(50.0, HexOrientation::PointyTop);
        let small = render_stamp(Symbol::HexOutline, Point::ZERO, SymbolSize::Small, 2.0, Rgba::RED, &grid);
        let large = render_stamp(Symbol::HexOutline, Point::ZERO, SymbolSize::Large, 2.0, Rgba::RED, &grid);
        let small_w = small[0].path().bounding_box().width();
        let large_w = large[0].path().bounding_box().width();
        assert!(large_w > small_w * 4.0);
    }
}
