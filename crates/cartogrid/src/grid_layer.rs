use cartogrid_core::{CartogramGrid, Feature, FeatureProjector, Layer, Shape};
use geo::{Coord, LineString, Rect};

pub const GRID_LAYER_NAME: &str = "Deformation grid";

/// Regular lines over `envelope`, `size` per axis, projected through the deformed grid.
pub(crate) fn deformation_grid_layer(
    grid: &CartogramGrid,
    envelope: Rect<f64>,
    size: usize,
    max_segment_length: f64,
) -> Layer {
    let (min, max) = (envelope.min(), envelope.max());
    let steps = (size.max(2) - 1) as f64;
    let dx = envelope.width() / steps;
    let dy = envelope.height() / steps;
    let projector = FeatureProjector::new(grid).with_max_segment_length(max_segment_length);

    let mut features = Vec::with_capacity(2 * size);
    for k in 0..size.max(2) {
        let x = min.x + k as f64 * dx;
        let y = min.y + k as f64 * dy;
        let vertical = LineString::new(vec![Coord { x, y: min.y }, Coord { x, y: max.y }]);
        let horizontal = LineString::new(vec![Coord { x: min.x, y }, Coord { x: max.x, y }]);
        for (axis, line) in [("x", vertical), ("y", horizontal)] {
            let feature = Feature::new(Shape::LineString(line))
                .with_attribute("axis", axis)
                .with_attribute("index", k);
            features.push(projector.project_feature(&feature));
        }
    }
    Layer::with_features(GRID_LAYER_NAME, features)
}
