//! Feature Density - counts points per polygon with a batch spatial join.
//!
//! Polygons are parsed from GeoJSON or feature-class JSON, indexed in a
//! quadtree, and every point record is classified independently. Per-label
//! counts are merged with an order-independent aggregation.

pub mod aggregate;
pub mod config;
pub mod emit;
pub mod error;
pub mod job;
pub mod models;
pub mod parser;
pub mod pip;

pub use aggregate::CountTable;
pub use config::{JobConfig, RecordConfig};
pub use emit::{Emitter, RecordOutcome, OUTSIDE_LABEL, UNKNOWN_LABEL};
pub use error::{DensityError, Result};
pub use models::{AttributeValue, Envelope, Feature};
pub use pip::FeatureIndex;
