//! Quadtree over feature envelopes.
//!
//! The tree stores `(feature index, envelope)` pairs only; geometry stays in
//! the feature list the indices point into. Each entry lives in the deepest
//! node whose quadrant fully contains its envelope, down to `MAX_DEPTH`.

use geo::Point;

use crate::models::Envelope;

/// Maximum subdivision depth (root is depth 0)
pub const MAX_DEPTH: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    feature: usize,
    envelope: Envelope,
}

/// A single node in the quadtree
#[derive(Debug)]
struct QuadTreeNode {
    bounds: Envelope,
    depth: u8,
    entries: Vec<Entry>,
    /// Child nodes (NW, NE, SW, SE) if subdivided
    children: Option<Box<[QuadTreeNode; 4]>>,
}

/// Root container for the spatial index, covering the whole WGS84 extent
#[derive(Debug)]
pub struct QuadTree {
    root: QuadTreeNode,
    len: usize,
}

impl QuadTree {
    pub fn new() -> Self {
        Self {
            root: QuadTreeNode::new(Envelope::WORLD, 0),
            len: 0,
        }
    }

    /// Insert a feature index under its envelope. Envelopes reaching past the
    /// world extent are kept at the root and can only match in-world points
    /// they actually cover.
    pub fn insert(&mut self, feature: usize, envelope: Envelope) {
        self.root.insert(Entry { feature, envelope });
        self.len += 1;
    }

    /// Feature indices whose envelope contains `point`, in ascending
    /// (insertion) order.
    pub fn query(&self, point: Point<f64>) -> Vec<usize> {
        let mut results = Vec::new();
        if self.root.bounds.contains_point(point) {
            self.root.query(point, &mut results);
        }
        results.sort_unstable();
        results
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deepest level that holds at least one entry (for stats)
    pub fn depth(&self) -> u8 {
        self.root.max_occupied_depth().unwrap_or(0)
    }
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadTreeNode {
    fn new(bounds: Envelope, depth: u8) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    /// Subdivide this node into 4 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let child_depth = self.depth + 1;
        let [nw, ne, sw, se] = self.bounds.quadrants();
        self.children = Some(Box::new([
            QuadTreeNode::new(nw, child_depth),
            QuadTreeNode::new(ne, child_depth),
            QuadTreeNode::new(sw, child_depth),
            QuadTreeNode::new(se, child_depth),
        ]));
    }

    fn insert(&mut self, entry: Entry) {
        if self.depth < MAX_DEPTH {
            let target = self
                .bounds
                .quadrants()
                .iter()
                .position(|quadrant| quadrant.contains(&entry.envelope));

            if let Some(i) = target {
                self.subdivide();
                if let Some(children) = &mut self.children {
                    children[i].insert(entry);
                    return;
                }
            }
        }

        self.entries.push(entry);
    }

    fn query(&self, point: Point<f64>, results: &mut Vec<usize>) {
        results.extend(
            self.entries
                .iter()
                .filter(|entry| entry.envelope.contains_point(point))
                .map(|entry| entry.feature),
        );

        // A point on a shared edge belongs to every child touching it
        if let Some(children) = &self.children {
            for child in children.iter() {
                if child.bounds.contains_point(point) {
                    child.query(point, results);
                }
            }
        }
    }

    fn max_occupied_depth(&self) -> Option<u8> {
        let own = (!self.entries.is_empty()).then_some(self.depth);
        let deeper = self
            .children
            .iter()
            .flat_map(|children| children.iter())
            .filter_map(QuadTreeNode::max_occupied_depth)
            .max();
        own.max(deeper)
    }
}
