//! Re-projection of features through a deformed [`CartogramGrid`].

use crate::error::Result;
use crate::feature::{Feature, Layer};
use crate::geom::Shape;
use crate::grid::CartogramGrid;
use crate::status::{StatusSink, check_cancelled};
use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

/// Projects features through a grid, optionally densifying long segments first.
#[derive(Debug, Clone, Copy)]
pub struct FeatureProjector<'a> {
    grid: &'a CartogramGrid,
    max_segment_length: Option<f64>,
}

impl<'a> FeatureProjector<'a> {
    pub fn new(grid: &'a CartogramGrid) -> Self {
        Self {
            grid,
            max_segment_length: None,
        }
    }

    /// Segments longer than `max` are split before projection.
    pub fn with_max_segment_length(mut self, max: f64) -> Self {
        self.max_segment_length = (max.is_finite() && max > 0.0).then_some(max);
        self
    }

    pub fn project_layer(&self, layer: &Layer, status: &dyn StatusSink) -> Result<Layer> {
        check_cancelled(status)?;
        let features = layer
            .features
            .iter()
            .map(|f| self.project_feature(f))
            .collect();
        Ok(Layer::with_features(layer.name.clone(), features))
    }

    /// Projects the geometry and copies the attributes.
    ///
    /// A geometry that cannot be rebuilt after projection is logged and left as `None`.
    pub fn project_feature(&self, feature: &Feature) -> Feature {
        Feature {
            geometry: feature.geometry.as_ref().and_then(|g| self.project_shape(g)),
            attributes: feature.attributes.clone(),
        }
    }

    pub fn project_shape(&self, shape: &Shape) -> Option<Shape> {
        match self.max_segment_length {
            Some(max) => project_shape(&regularize_shape(shape, max), self.grid),
            None => project_shape(shape, self.grid),
        }
    }
}

pub fn project_shape(shape: &Shape, grid: &CartogramGrid) -> Option<Shape> {
    let line = |ls: &LineString<f64>| LineString::new(grid.project_coordinates(&ls.0));
    Some(match shape {
        Shape::Point(p) => Shape::Point(Point::from(grid.project_coord(p.0))),
        Shape::MultiPoint(mp) => Shape::MultiPoint(MultiPoint::new(
            mp.0.iter()
                .map(|p| Point::from(grid.project_coord(p.0)))
                .collect(),
        )),
        Shape::LineString(ls) => Shape::LineString(line(ls)),
        Shape::LinearRing(ls) => Shape::LinearRing(line(ls)),
        Shape::MultiLineString(mls) => {
            Shape::MultiLineString(MultiLineString::new(mls.0.iter().map(line).collect()))
        }
        Shape::Polygon(p) => Shape::Polygon(project_polygon(p, grid)?),
        Shape::MultiPolygon(mp) => {
            let parts: Vec<Polygon<f64>> = mp
                .0
                .iter()
                .filter_map(|p| project_polygon(p, grid))
                .collect();
            if parts.is_empty() {
                tracing::error!("every polygon of a multipolygon degenerated during projection");
                return None;
            }
            Shape::MultiPolygon(MultiPolygon::new(parts))
        }
    })
}

fn project_polygon(polygon: &Polygon<f64>, grid: &CartogramGrid) -> Option<Polygon<f64>> {
    let exterior = grid.project_coordinates(&polygon.exterior().0);
    if !is_valid_ring(&exterior) {
        tracing::error!(
            coords = exterior.len(),
            "projected exterior ring is degenerate, dropping the polygon"
        );
        return None;
    }
    let interiors = polygon
        .interiors()
        .iter()
        .filter_map(|ring| {
            let projected = grid.project_coordinates(&ring.0);
            if is_valid_ring(&projected) {
                Some(LineString::new(projected))
            } else {
                tracing::error!(
                    coords = projected.len(),
                    "projected interior ring is degenerate, dropping the hole"
                );
                None
            }
        })
        .collect();
    Some(Polygon::new(LineString::new(exterior), interiors))
}

fn is_valid_ring(coords: &[Coord<f64>]) -> bool {
    coords.len() >= 4
        && coords.iter().all(|c| c.x.is_finite() && c.y.is_finite())
        && coords.first() == coords.last()
}

/// Splits every segment longer than `max_len` into `2^k` equal parts, `k` as small as possible.
///
/// The first and last coordinates of the input are kept bit-for-bit.
pub fn regularize_coordinates(coords: &[Coord<f64>], max_len: f64) -> Vec<Coord<f64>> {
    if !(max_len.is_finite() && max_len > 0.0) || coords.len() < 2 {
        return coords.to_vec();
    }
    let mut out = Vec::with_capacity(coords.len());
    out.push(coords[0]);
    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let d = b - a;
        let len = d.x.hypot(d.y);
        let mut parts: u32 = 1;
        while len / f64::from(parts) > max_len && parts < (1 << 20) {
            parts <<= 1;
        }
        for m in 1..parts {
            out.push(a + d * (f64::from(m) / f64::from(parts)));
        }
        out.push(b);
    }
    out
}

pub fn regularize_shape(shape: &Shape, max_len: f64) -> Shape {
    let line = |ls: &LineString<f64>| LineString::new(regularize_coordinates(&ls.0, max_len));
    let polygon = |p: &Polygon<f64>| {
        Polygon::new(line(p.exterior()), p.interiors().iter().map(line).collect())
    };
    match shape {
        Shape::Point(_) | Shape::MultiPoint(_) => shape.clone(),
        Shape::LineString(ls) => Shape::LineString(line(ls)),
        Shape::LinearRing(ls) => Shape::LinearRing(line(ls)),
        Shape::MultiLineString(mls) => {
            Shape::MultiLineString(MultiLineString::new(mls.0.iter().map(line).collect()))
        }
        Shape::Polygon(p) => Shape::Polygon(polygon(p)),
        Shape::MultiPolygon(mp) => Shape::MultiPolygon(MultiPolygon::new(
            mp.0.iter().map(polygon).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Cancellation, NoopStatus};
    use crate::{Error, StatusSink};
    use geo::{Rect, coord, line_string, polygon};

    fn grid() -> CartogramGrid {
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 4.0, y: 4.0 });
        CartogramGrid::new(5, 5, env).unwrap()
    }

    #[test]
    fn regularization_uses_powers_of_two() {
        let out = regularize_coordinates(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 3.0, y: 0.0 }], 1.0);
        assert_eq!(out.len(), 5);
        assert_eq!(out[1], coord! { x: 0.75, y: 0.0 });
        assert_eq!(out[4], coord! { x: 3.0, y: 0.0 });
    }

    #[test]
    fn short_segments_are_untouched() {
        let coords = [coord! { x: 0.0, y: 0.0 }, coord! { x: 0.5, y: 0.5 }];
        assert_eq!(regularize_coordinates(&coords, 1.0), coords.to_vec());
    }

    #[test]
    fn polygons_gain_vertices_at_grid_crossings() {
        let g = grid();
        let square = Shape::Polygon(polygon![
            (x: 0.5, y: 0.5),
            (x: 2.5, y: 0.5),
            (x: 2.5, y: 2.5),
            (x: 0.5, y: 2.5),
        ]);
        let Some(Shape::Polygon(p)) = FeatureProjector::new(&g).project_shape(&square) else {
            panic!("expected a polygon");
        };
        // four corners plus two crossings per side, closed
        assert_eq!(p.exterior().0.len(), 13);
    }

    #[test]
    fn degenerate_rings_drop_the_geometry_but_keep_the_feature() {
        let g = grid();
        let bad = Shape::Polygon(Polygon::new(
            line_string![(x: 1.0, y: 1.0), (x: f64::NAN, y: 1.0), (x: 1.0, y: 1.0)],
            vec![],
        ));
        let feature = Feature::new(bad).with_attribute("name", "x");
        let projected = FeatureProjector::new(&g).project_feature(&feature);
        assert!(projected.geometry.is_none());
        assert_eq!(projected.attributes, feature.attributes);
    }

    #[test]
    fn project_layer_observes_cancellation() {
        struct Cancelled(Cancellation);
        impl StatusSink for Cancelled {
            fn on_progress(&self, _: u16, _: &str, _: &str) {}
            fn is_cancelled(&self) -> bool {
                self.0.is_cancelled()
            }
        }
        let g = grid();
        let layer = Layer::with_features(
            "l",
            vec![Feature::new(Shape::Point(Point::new(1.0, 1.0)))],
        );
        let token = Cancellation::new();
        let sink = Cancelled(token.clone());
        assert!(FeatureProjector::new(&g).project_layer(&layer, &sink).is_ok());
        assert!(FeatureProjector::new(&g).project_layer(&layer, &NoopStatus).is_ok());
        token.cancel();
        assert!(matches!(
            FeatureProjector::new(&g).project_layer(&layer, &sink),
            Err(Error::Interrupted)
        ));
    }
}
