//! Conversions between the canonical geometry model and the `geo` crate.

use geo::algorithm::convex_hull::ConvexHull;
use geo::{Coord, LineString, MultiPoint, Point, Polygon};

pub use onestop_core::models::Geometry;

/// Convert a geo::Polygon to a canonical Polygon geometry
pub fn from_geo_polygon(polygon: &Polygon<f64>) -> Geometry {
    let ring = |ls: &LineString<f64>| ls.coords().map(|c| [c.x, c.y]).collect::<Vec<_>>();
    let mut rings = vec![ring(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring));
    Geometry::polygon(rings)
}

/// Convex hull of a set of points as a Polygon geometry; `None` without points
pub fn convex_hull(points: &[Coord<f64>]) -> Option<Geometry> {
    if points.is_empty() {
        return None;
    }
    let multi: MultiPoint<f64> = points.iter().map(|c| Point::from(*c)).collect();
    Some(from_geo_polygon(&multi.convex_hull()))
}

/// Build a MultiLineString geometry from coordinate sequences
pub fn multi_line_string(lines: &[Vec<Coord<f64>>]) -> Geometry {
    Geometry::multi_line_string(
        lines.iter().map(|line| line.iter().map(|c| [c.x, c.y]).collect()).collect(),
    )
}

/// Extension trait for Geometry with geo-crate operations
pub trait GeometryExt {
    /// Point location as a geo coordinate
    fn point_coord(&self) -> Option<Coord<f64>>;
}

impl GeometryExt for Geometry {
    fn point_coord(&self) -> Option<Coord<f64>> {
        self.as_point().map(|[x, y]| Coord { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convex_hull() {
        let points = [
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 2.0, y: 2.0 },
            Coord { x: 0.0, y: 2.0 },
        ];
        let hull = convex_hull(&points).unwrap();

        let Geometry::Polygon { coordinates } = hull else {
            panic!("Expected Polygon geometry");
        };
        // Interior point dropped, ring closed
        assert_eq!(coordinates.len(), 1);
        assert_eq!(coordinates[0].len(), 5);
        assert!(!coordinates[0].contains(&[1.0, 1.0]));
        assert_eq!(coordinates[0].first(), coordinates[0].last());
    }

    #[test]
    fn test_convex_hull_empty() {
        assert!(convex_hull(&[]).is_none());
    }

    #[test]
    fn test_multi_line_string() {
        let lines = vec![vec![Coord { x: 1.0, y: 2.0 }, Coord { x: 3.0, y: 4.0 }]];
        assert_eq!(
            multi_line_string(&lines),
            Geometry::multi_line_string(vec![vec![[1.0, 2.0], [3.0, 4.0]]])
        );
    }

    #[test]
    fn test_point_coord() {
        assert_eq!(Geometry::point(1.0, 2.0).point_coord(), Some(Coord { x: 1.0, y: 2.0 }));
        assert_eq!(Geometry::multi_line_string(vec![]).point_coord(), None);
    }
}
