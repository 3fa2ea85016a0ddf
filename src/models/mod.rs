//! Core data models for the polygon density job.

pub mod envelope;
pub mod feature;

pub use envelope::Envelope;
pub use feature::{AttributeValue, Attributes, Feature};
