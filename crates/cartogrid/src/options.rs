use crate::{Error, Result};
use cartogrid_diffusion::Algorithm;
use serde::{Deserialize, Serialize};

/// Options of one cartogram computation.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// let opts = cartogrid::CartogramOptions::from_json_str(
///     r#"{ "gridSize": 128, "algorithm": { "type": "gastner", "latticeSize": 64 } }"#,
/// ).unwrap();
/// assert_eq!(opts.grid_size, 128);
/// assert_eq!(opts.amount_of_deformation, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartogramOptions {
    /// The master attribute already is a density; otherwise it is divided by feature area.
    pub attribute_is_density: bool,
    /// Grid nodes along the longer side of the enlarged envelope.
    pub grid_size: usize,
    /// `0` leaves the map unchanged, `100` applies the full deformation.
    pub amount_of_deformation: u8,
    /// Attribute value marking features without data.
    pub missing_value: Option<f64>,
    pub algorithm: Algorithm,
    /// Segments longer than this are split before projection. Defaults to 1/500 of the longer
    /// envelope side.
    pub max_segment_length: Option<f64>,
    pub create_grid_layer: bool,
    /// Lines per axis of the deformation grid layer.
    pub grid_layer_size: usize,
    pub create_legend: bool,
}

impl Default for CartogramOptions {
    fn default() -> Self {
        Self {
            attribute_is_density: false,
            grid_size: 256,
            amount_of_deformation: 100,
            missing_value: None,
            algorithm: Algorithm::default(),
            max_segment_length: None,
            create_grid_layer: true,
            grid_layer_size: 100,
            create_legend: true,
        }
    }
}

impl CartogramOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size < 3 {
            return Err(invalid("grid_size", format!("must be at least 3, got {}", self.grid_size)));
        }
        if self.amount_of_deformation > 100 {
            return Err(invalid(
                "amount_of_deformation",
                format!("must be a percentage, got {}", self.amount_of_deformation),
            ));
        }
        if let Some(max) = self.max_segment_length {
            if !(max.is_finite() && max > 0.0) {
                return Err(invalid("max_segment_length", format!("must be positive, got {max}")));
            }
        }
        if self.create_grid_layer && self.grid_layer_size < 2 {
            return Err(invalid(
                "grid_layer_size",
                format!("must be at least 2, got {}", self.grid_layer_size),
            ));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, message: String) -> Error {
    Error::Core(cartogrid_core::Error::InvalidParameter { name, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let opts = CartogramOptions::default();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"amountOfDeformation\":100"));
        assert!(json.contains("\"type\":\"newman\""));
        assert_eq!(CartogramOptions::from_json_str(&json).unwrap(), opts);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(CartogramOptions::from_json_str(r#"{"gridSize": 2}"#).is_err());
        assert!(CartogramOptions::from_json_str(r#"{"amountOfDeformation": 150}"#).is_err());
        assert!(matches!(
            CartogramOptions::from_json_str("{not json"),
            Err(Error::Options(_))
        ));
    }
}
