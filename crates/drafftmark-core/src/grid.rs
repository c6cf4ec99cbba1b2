//! Grid descriptor supplied by the host scene.

use serde::{Deserialize, Serialize};

/// Cell size used when the host does not describe its grid.
pub const DEFAULT_GRID_SIZE: f64 = 100.0;

/// Orientation of a hex grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HexOrientation {
    #[default]
    FlatTop,
    PointyTop,
}

/// Cell size and orientation of the scene grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// Distance between the centers of adjacent cells, in world pixels.
    pub size: f64,
    /// Hex orientation, if the host grid is a hex grid.
    pub orientation: Option<HexOrientation>,
}

impl Default for GridDescriptor {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            orientation: None,
        }
    }
}

impl GridDescriptor {
    pub fn hex(size: f64, orientation: HexOrientation) -> Self {
        Self {
            size,
            orientation: Some(orientation),
        }
    }

    /// Hex orientation, flat-top when the host leaves it undetermined.
    pub fn orientation(&self) -> HexOrientation {
        self.orientation.unwrap_or_default()
    }

    /// Center-to-vertex radius of one hex cell.
    pub fn vertex_radius(&self) -> f64 {
        self.size / 2.0 * (2.0 / 3f64.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_defaults_to_flat_top() {
        let grid = GridDescriptor::default();
        assert_eq!(grid.orientation(), HexOrientation::FlatTop);
        let grid = GridDescriptor::hex(50.0, HexOrientation::PointyTop);
        assert_eq!(grid.orientation(), HexOrientation::PointyTop);
    }

    #[test]
    fn test_adjacent_centers_are_one_cell_apart() {
        let grid = GridDescriptor::hex(100.0, HexOrientation::FlatTop);
        // Adjacent hex centers sit sqrt(3) * r apart.
        assert!((grid.vertex_radius() * 3f64.sqrt() - 100.0).abs() < 1e-9);
    }
}
