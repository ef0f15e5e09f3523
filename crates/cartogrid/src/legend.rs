//! Legend squares sized at the cartogram's value-per-area scale.

use cartogrid_core::{Feature, Layer, Shape};
use geo::{Coord, Rect};

pub const LEGEND_LAYER_NAME: &str = "Legend";

/// Largest value of the form `{1, 2, 5} · 10^k` not exceeding `v`.
pub fn nice_value(v: f64) -> f64 {
    if !(v.is_finite() && v > 0.0) {
        return 0.0;
    }
    let magnitude = 10f64.powi(v.log10().floor() as i32);
    let lead = v / magnitude;
    let step = if lead >= 5.0 {
        5.0
    } else if lead >= 2.0 {
        2.0
    } else {
        1.0
    };
    step * magnitude
}

/// Three squares for a rounded mean value and its neighbours on the `{1, 2, 5}` ladder.
///
/// `scale` is attribute value per unit of cartogram area; the squares are stacked to the right of
/// `envelope`.
pub(crate) fn legend_layer(mean_value: f64, scale: f64, envelope: Rect<f64>) -> Option<Layer> {
    let base = nice_value(mean_value);
    if base <= 0.0 || !(scale.is_finite() && scale > 0.0) {
        return None;
    }
    let gap = 0.05 * envelope.width().max(envelope.height());
    let x0 = envelope.max().x + gap;
    let mut y = envelope.min().y;

    let features = [0.5, 1.0, 2.5]
        .into_iter()
        .map(|factor| {
            let value = nice_value(base * factor);
            let side = (value / scale).sqrt();
            let square = Rect::new(Coord { x: x0, y }, Coord { x: x0 + side, y: y + side });
            y += side + 0.5 * gap;
            Feature::new(Shape::Polygon(square.to_polygon()))
                .with_attribute("value", value)
                .with_attribute("label", format_value(value))
        })
        .collect();
    Some(Layer::with_features(LEGEND_LAYER_NAME, features))
}

fn format_value(v: f64) -> String {
    if v >= 1.0 && v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn nice_values_round_down_to_one_two_five() {
        assert_eq!(nice_value(7.3), 5.0);
        assert_eq!(nice_value(2.0), 2.0);
        assert_eq!(nice_value(1999.0), 1000.0);
        assert_eq!(nice_value(0.034), 0.02);
        assert_eq!(nice_value(0.0), 0.0);
    }

    #[test]
    fn legend_square_areas_follow_the_scale() {
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
        let layer = legend_layer(120.0, 4.0, env).unwrap();
        let values: Vec<f64> = layer
            .features
            .iter()
            .map(|f| f.number("value").unwrap())
            .collect();
        assert_eq!(values, vec![50.0, 100.0, 200.0]);
        for f in &layer.features {
            let expected = f.number("value").unwrap() / 4.0;
            assert!((f.area() - expected).abs() < 1e-9);
            assert!(f.envelope().unwrap().min().x > 10.0);
        }
        assert_eq!(layer.features[1].attributes["label"], "100");
    }
}
