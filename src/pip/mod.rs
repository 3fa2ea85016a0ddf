//! Point-in-Polygon (PIP) classification.
//!
//! A quadtree narrows each point down to the features whose envelope covers
//! it; an exact containment test picks the owning feature.

mod index;
mod quadtree;

pub use index::FeatureIndex;
pub use quadtree::{QuadTree, MAX_DEPTH};
