//! Polyline, box and ellipse strokes with solid, dotted and dashed styles.

use std::f64::consts::TAU;

use kurbo::{BezPath, Circle, Ellipse, Point, Rect, Shape, Size};

use super::{LineStyle, Primitive, Rgba};

/// Dot radius as a multiple of the stroke width.
pub const DOT_RADIUS_RATIO: f64 = 0.4;
/// Distance between dot centers as a multiple of the stroke width.
pub const DOT_PITCH_RATIO: f64 = 4.0;
/// Drawn dash length as a multiple of the stroke width.
pub const DASH_RATIO: f64 = 6.0;
/// Gap between dashes as a multiple of the stroke width.
pub const GAP_RATIO: f64 = 2.0;
/// Perimeter samples used to approximate a styled ellipse.
pub const ELLIPSE_SEGMENTS: usize = 48;

const PATH_TOLERANCE: f64 = 0.1;
const CLOSE_EPSILON: f64 = 1e-6;

/// Draw an ordered polyline. `points` are offsets from `origin`.
pub fn render_stroke(
    points: &[Point],
    origin: Point,
    width: f64,
    color: Rgba,
    style: LineStyle,
) -> Vec<Primitive> {
    let absolute: Vec<Point> = points.iter().map(|p| origin + p.to_vec2()).collect();
    if absolute.is_empty() {
        return Vec::new();
    }

    match style {
        LineStyle::Solid => {
            if absolute.len() < 2 {
                return Vec::new();
            }
            vec![Primitive::stroke(solid_path(&absolute), width, color)]
        }
        LineStyle::Dotted => {
            let path = dotted_path(&absolute, width);
            if path.elements().is_empty() {
                return Vec::new();
            }
            vec![Primitive::fill(path, color)]
        }
        LineStyle::Dashed => {
            let path = dashed_path(&absolute, width);
            if path.elements().is_empty() {
                return Vec::new();
            }
            vec![Primitive::stroke(path, width, color)]
        }
    }
}

/// Draw a closed outline one edge at a time. The dot or dash pattern restarts
/// at every vertex; the edges are batched into a single primitive.
fn render_edges(outline: &[Point], origin: Point, width: f64, color: Rgba, style: LineStyle) -> Vec<Primitive> {
    let mut batched: Option<Primitive> = None;
    for edge in outline.windows(2) {
        for primitive in render_stroke(edge, origin, width, color, style) {
            match batched.as_mut() {
                Some(acc) => acc.path_mut().extend(primitive.path().elements().iter().copied()),
                None => batched = Some(primitive),
            }
        }
    }
    batched.into_iter().collect()
}

/// Draw the outline of an axis-aligned box.
pub fn render_box(origin: Point, size: Size, width: f64, color: Rgba, style: LineStyle) -> Vec<Primitive> {
    match style {
        LineStyle::Solid => {
            let rect = Rect::from_origin_size(origin, size);
            vec![Primitive::stroke(rect.to_path(PATH_TOLERANCE), width, color)]
        }
        LineStyle::Dotted | LineStyle::Dashed => {
            let corners = [
                Point::ZERO,
                Point::new(size.width, 0.0),
                Point::new(size.width, size.height),
                Point::new(0.0, size.height),
                Point::ZERO,
            ];
            render_edges(&corners, origin, width, color, style)
        }
    }
}

/// Draw the outline of the ellipse inscribed in the box at `origin`.
pub fn render_ellipse(origin: Point, size: Size, width: f64, color: Rgba, style: LineStyle) -> Vec<Primitive> {
    match style {
        LineStyle::Solid => {
            let ellipse = Ellipse::from_rect(Rect::from_origin_size(origin, size));
            vec![Primitive::stroke(ellipse.to_path(PATH_TOLERANCE), width, color)]
        }
        LineStyle::Dotted | LineStyle::Dashed => {
            let (rx, ry) = (size.width / 2.0, size.height / 2.0);
            let perimeter: Vec<Point> = (0..=ELLIPSE_SEGMENTS)
                .map(|i| {
                    let angle = TAU * i as f64 / ELLIPSE_SEGMENTS as f64;
                    Point::new(rx + rx * angle.cos(), ry + ry * angle.sin())
                })
                .collect();
            render_edges(&perimeter, origin, width, color, style)
        }
    }
}

fn solid_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(points[0]);
    let closed = points.len() > 2 && points[0].distance(points[points.len() - 1]) < CLOSE_EPSILON;
    let end = if closed { points.len() - 1 } else { points.len() };
    for point in &points[1..end] {
        path.line_to(*point);
    }
    if closed {
        path.close_path();
    }
    path
}

/// Filled circles stamped every `DOT_PITCH_RATIO * width` of arc length, batched into one path.
fn dotted_path(points: &[Point], width: f64) -> BezPath {
    let pitch = DOT_PITCH_RATIO * width;
    let radius = DOT_RADIUS_RATIO * width;
    let mut path = BezPath::new();
    if pitch <= 0.0 {
        return path;
    }

    if points.len() == 1 {
        path.extend(Circle::new(points[0], radius).path_elements(PATH_TOLERANCE));
        return path;
    }

    let mut travelled = 0.0;
    let mut next_dot = 0.0;
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = a.distance(b);
        if !len.is_finite() || len <= f64::EPSILON {
            continue;
        }
        while next_dot <= travelled + len {
            let center = a.lerp(b, (next_dot - travelled) / len);
            path.extend(Circle::new(center, radius).path_elements(PATH_TOLERANCE));
            next_dot += pitch;
        }
        travelled += len;
    }
    path
}

/// Alternating draw/gap runs along cumulative arc length; runs continue across vertices.
fn dashed_path(points: &[Point], width: f64) -> BezPath {
    let dash = DASH_RATIO * width;
    let gap = GAP_RATIO * width;
    let mut path = BezPath::new();
    if dash <= 0.0 {
        return path;
    }

    let mut drawing = true;
    let mut remaining = dash;
    let mut pen_down = false;
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = a.distance(b);
        if !len.is_finite() || len <= f64::EPSILON {
            continue;
        }
        let mut along = 0.0;
        while along < len {
            let step = remaining.min(len - along);
            let start = a.lerp(b, along / len);
            let end = a.lerp(b, (along + step) / len);
            if drawing {
                if !pen_down {
                    path.move_to(start);
                    pen_down = true;
                }
                path.line_to(end);
            }
            along += step;
            remaining -= step;
            if remaining <= 1e-9 {
                drawing = !drawing;
                remaining = if drawing { dash } else { gap };
                pen_down = false;
            }
        }
    }
    path
}
