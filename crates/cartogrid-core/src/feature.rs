use crate::geom::{Shape, union_envelopes};
use geo::Rect;
use indexmap::IndexMap;
use serde_json::Value;

/// Attribute table of a feature, in insertion order.
pub type Attributes = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    /// `None` when a projection produced no usable geometry.
    pub geometry: Option<Shape>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: Shape) -> Self {
        Self {
            geometry: Some(geometry),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Numeric attribute value. Numeric strings are accepted; NaN and non-numbers are not.
    pub fn number(&self, name: &str) -> Option<f64> {
        let v = match self.attributes.get(name)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (!v.is_nan()).then_some(v)
    }

    pub fn area(&self) -> f64 {
        self.geometry.as_ref().map_or(0.0, Shape::area)
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref().and_then(Shape::envelope)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layer {
    pub name: String,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn with_features(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .fold(None, |acc, f| union_envelopes(acc, f.envelope()))
    }

    pub fn total_area(&self) -> f64 {
        self.features.iter().map(Feature::area).sum()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
