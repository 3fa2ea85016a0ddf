//! Attributed geometry features.

use std::collections::HashMap;
use std::fmt;

use geo::{BoundingRect, Geometry};
use serde_json::{Map, Value};

use super::Envelope;

/// A typed attribute value. JSON values of other kinds are not represented.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Coerce a JSON value. Booleans, nulls, objects and arrays yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(AttributeValue::Integer(i))
                } else {
                    n.as_f64().map(AttributeValue::Float)
                }
            }
            Value::String(s) => Some(AttributeValue::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(i) => write!(f, "{}", i),
            // Debug keeps the fractional part on whole numbers ("2.0", not "2")
            AttributeValue::Float(v) => write!(f, "{:?}", v),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

pub type Attributes = HashMap<String, AttributeValue>;

/// Build an attribute map from a JSON object, dropping unsupported kinds.
pub fn attributes_from_json(object: &Map<String, Value>) -> Attributes {
    object
        .iter()
        .filter_map(|(key, value)| AttributeValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

/// A single geometry with its attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Minimum bounding box of the geometry; `None` for empty geometries
    pub fn envelope(&self) -> Option<Envelope> {
        self.geometry.bounding_rect().map(Envelope::from_rect)
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}
