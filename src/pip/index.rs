//! Immutable feature list plus its quadtree.

use geo::{Intersects, Point};
use tracing::{debug, info, warn};

use super::QuadTree;
use crate::models::{Envelope, Feature};

/// The read-only bundle every worker classifies against.
///
/// Built once; the tree refers to features by their position in `features`.
#[derive(Debug)]
pub struct FeatureIndex {
    features: Vec<Feature>,
    tree: QuadTree,
}

impl FeatureIndex {
    /// Build the spatial index, inserting features in list order
    pub fn build(features: Vec<Feature>) -> Self {
        info!("Building spatial index for {} features...", features.len());

        let mut tree = QuadTree::new();
        let mut out_of_extent = 0usize;

        for (i, feature) in features.iter().enumerate() {
            let Some(envelope) = feature.envelope() else {
                debug!("Feature {} has an empty geometry, not indexed", i);
                continue;
            };
            if !Envelope::WORLD.contains(&envelope) {
                out_of_extent += 1;
            }
            tree.insert(i, envelope);
        }

        if out_of_extent > 0 {
            warn!(
                "{} features extend beyond the WGS84 extent and may never match",
                out_of_extent
            );
        }
        info!(
            "Spatial index built with {} entries (max depth {})",
            tree.len(),
            tree.depth()
        );

        Self { features, tree }
    }

    /// Index of the first feature, in insertion order, whose geometry
    /// contains `point` (boundary inclusive).
    ///
    /// Overlapping features are not ranked geometrically: the earliest
    /// inserted one wins.
    pub fn classify(&self, point: Point<f64>) -> Option<usize> {
        self.tree
            .query(point)
            .into_iter()
            .find(|&i| self.features[i].geometry.intersects(&point))
    }

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Get total number of indexed features
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
