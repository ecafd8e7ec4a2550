//! GeoJSON geometry carried by entities.
//!
//! Stops are points, routes are multi-line strings and operators and feeds
//! are convex-hull polygons. Coordinates are `[longitude, latitude]`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { coordinates: [x, y] }
    }

    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    pub fn multi_line_string(lines: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::MultiLineString { coordinates: lines }
    }

    /// Coordinates of a Point geometry, `None` for every other type
    pub fn as_point(&self) -> Option<[f64; 2]> {
        match self {
            Geometry::Point { coordinates } => Some(*coordinates),
            _ => None,
        }
    }

    /// Parse a GeoJSON value; `None` for malformed or unsupported types
    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
