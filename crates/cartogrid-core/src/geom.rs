//! Geometry variants understood by the cartogram core.
//!
//! Primitives and predicates come from `geo`; [`Shape`] narrows `geo::Geometry` to the kinds a
//! cartogram layer can carry and keeps linear rings distinct from open line strings.

use crate::error::{Error, Result};
use geo::{
    Area, BoundingRect, Contains, Coord, Geometry, Intersects, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon, Rect,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    LineString(LineString<f64>),
    /// A closed line string treated as a line (it encloses no area).
    LinearRing(LineString<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Point(_) => "Point",
            Shape::LineString(_) => "LineString",
            Shape::LinearRing(_) => "LinearRing",
            Shape::MultiPoint(_) => "MultiPoint",
            Shape::MultiLineString(_) => "MultiLineString",
            Shape::Polygon(_) => "Polygon",
            Shape::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn is_areal(&self) -> bool {
        matches!(self, Shape::Polygon(_) | Shape::MultiPolygon(_))
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        match self {
            Shape::Point(p) => Some(p.bounding_rect()),
            Shape::LineString(ls) | Shape::LinearRing(ls) => ls.bounding_rect(),
            Shape::MultiPoint(mp) => mp.bounding_rect(),
            Shape::MultiLineString(mls) => mls.bounding_rect(),
            Shape::Polygon(p) => p.bounding_rect(),
            Shape::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    /// Planar area; zero for puntal and lineal shapes.
    pub fn area(&self) -> f64 {
        match self {
            Shape::Polygon(p) => p.unsigned_area(),
            Shape::MultiPolygon(mp) => mp.unsigned_area(),
            _ => 0.0,
        }
    }

    /// Interior containment. Only areal shapes can contain a coordinate.
    pub fn contains_coord(&self, c: Coord<f64>) -> bool {
        let pt = Point::from(c);
        match self {
            Shape::Polygon(p) => p.contains(&pt),
            Shape::MultiPolygon(mp) => mp.0.iter().any(|p| p.contains(&pt)),
            _ => false,
        }
    }

    /// True when the shape touches or overlaps `rect`, including when it lies fully inside it.
    pub fn intersects_rect(&self, rect: &Rect<f64>) -> bool {
        let cell = rect.to_polygon();
        match self {
            Shape::Point(p) => cell.intersects(&p.0),
            Shape::LineString(ls) | Shape::LinearRing(ls) => ls.intersects(&cell),
            Shape::MultiPoint(mp) => mp.0.iter().any(|p| cell.intersects(&p.0)),
            Shape::MultiLineString(mls) => mls.0.iter().any(|ls| ls.intersects(&cell)),
            Shape::Polygon(p) => p.intersects(&cell),
            Shape::MultiPolygon(mp) => mp.0.iter().any(|p| p.intersects(&cell)),
        }
    }

    pub fn coord_count(&self) -> usize {
        match self {
            Shape::Point(_) => 1,
            Shape::LineString(ls) | Shape::LinearRing(ls) => ls.0.len(),
            Shape::MultiPoint(mp) => mp.0.len(),
            Shape::MultiLineString(mls) => mls.0.iter().map(|ls| ls.0.len()).sum(),
            Shape::Polygon(p) => polygon_coord_count(p),
            Shape::MultiPolygon(mp) => mp.0.iter().map(polygon_coord_count).sum(),
        }
    }
}

fn polygon_coord_count(p: &Polygon<f64>) -> usize {
    p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>()
}

impl TryFrom<Geometry<f64>> for Shape {
    type Error = Error;

    fn try_from(value: Geometry<f64>) -> Result<Self> {
        Ok(match value {
            Geometry::Point(p) => Shape::Point(p),
            Geometry::Line(l) => Shape::LineString(LineString::new(vec![l.start, l.end])),
            Geometry::LineString(ls) if ls.is_closed() && ls.0.len() >= 4 => Shape::LinearRing(ls),
            Geometry::LineString(ls) => Shape::LineString(ls),
            Geometry::Polygon(p) => Shape::Polygon(p),
            Geometry::MultiPoint(mp) => Shape::MultiPoint(mp),
            Geometry::MultiLineString(mls) => Shape::MultiLineString(mls),
            Geometry::MultiPolygon(mp) => Shape::MultiPolygon(mp),
            Geometry::Rect(r) => Shape::Polygon(r.to_polygon()),
            Geometry::Triangle(t) => Shape::Polygon(t.to_polygon()),
            Geometry::GeometryCollection(_) => {
                return Err(Error::UnsupportedGeometry {
                    kind: "GeometryCollection".to_string(),
                });
            }
        })
    }
}

impl From<Shape> for Geometry<f64> {
    fn from(value: Shape) -> Self {
        match value {
            Shape::Point(p) => Geometry::Point(p),
            Shape::LineString(ls) | Shape::LinearRing(ls) => Geometry::LineString(ls),
            Shape::MultiPoint(mp) => Geometry::MultiPoint(mp),
            Shape::MultiLineString(mls) => Geometry::MultiLineString(mls),
            Shape::Polygon(p) => Geometry::Polygon(p),
            Shape::MultiPolygon(mp) => Geometry::MultiPolygon(mp),
        }
    }
}

pub fn union_envelopes(a: Option<Rect<f64>>, b: Option<Rect<f64>>) -> Option<Rect<f64>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Rect::new(
            Coord {
                x: a.min().x.min(b.min().x),
                y: a.min().y.min(b.min().y),
            },
            Coord {
                x: a.max().x.max(b.max().x),
                y: a.max().y.max(b.max().y),
            },
        )),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Grows `rect` on every side by `fraction` of its width (x) and height (y).
pub fn expand_envelope(rect: Rect<f64>, fraction: f64) -> Rect<f64> {
    let dx = rect.width() * fraction;
    let dy = rect.height() * fraction;
    Rect::new(
        Coord {
            x: rect.min().x - dx,
            y: rect.min().y - dy,
        },
        Coord {
            x: rect.max().x + dx,
            y: rect.max().y + dy,
        },
    )
}

/// Intersection of the line through `a`–`b` with the line through `c`–`d`.
///
/// Returns `None` for parallel or degenerate segments.
#[allow(clippy::too_many_arguments)]
pub fn intersection_of_segments(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<Coord<f64>> {
    let (d1x, d1y) = (bx - ax, by - ay);
    let (d2x, d2y) = (dx - cx, dy - cy);
    let denom = d1x * d2y - d1y * d2x;
    let scale = (d1x.hypot(d1y)) * (d2x.hypot(d2y));
    if scale == 0.0 || !denom.is_finite() || denom.abs() <= 1e-12 * scale {
        return None;
    }
    let t = ((cx - ax) * d2y - (cy - ay) * d2x) / denom;
    Some(Coord {
        x: ax + t * d1x,
        y: ay + t * d1y,
    })
}

/// Area of a simple quadrilateral given in ring order.
pub fn quad_area(corners: &[Coord<f64>; 4]) -> f64 {
    let mut twice = 0.0;
    for k in 0..4 {
        let a = corners[k];
        let b = corners[(k + 1) % 4];
        twice += a.x * b.y - b.x * a.y;
    }
    0.5 * twice.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    #[test]
    fn intersection_of_crossing_diagonals_is_the_centre() {
        let p = intersection_of_segments(0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0).unwrap();
        assert_eq!(p, coord! { x: 0.5, y: 0.5 });
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        assert!(intersection_of_segments(0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0).is_none());
        assert!(intersection_of_segments(0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn polygon_predicates() {
        let square = Shape::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]);
        assert_eq!(square.area(), 4.0);
        assert!(square.contains_coord(coord! { x: 1.0, y: 1.0 }));
        assert!(!square.contains_coord(coord! { x: 3.0, y: 1.0 }));
        let inside = Rect::new(coord! { x: 0.5, y: 0.5 }, coord! { x: 1.0, y: 1.0 });
        let outside = Rect::new(coord! { x: 5.0, y: 5.0 }, coord! { x: 6.0, y: 6.0 });
        assert!(square.intersects_rect(&inside));
        assert!(!square.intersects_rect(&outside));
    }

    #[test]
    fn quad_area_of_unit_square() {
        let corners = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 1.0 },
        ];
        assert_eq!(quad_area(&corners), 1.0);
    }

    #[test]
    fn geometry_collections_are_rejected() {
        let gc = Geometry::GeometryCollection(geo::GeometryCollection(Vec::new()));
        assert!(matches!(
            Shape::try_from(gc),
            Err(Error::UnsupportedGeometry { .. })
        ));
    }
}
