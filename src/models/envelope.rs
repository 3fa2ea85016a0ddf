//! Axis-aligned bounding envelopes in WGS84 lon/lat.

use geo::{Point, Rect};

/// Bounding box envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    /// The fixed extent every indexed feature is expected to live in.
    pub const WORLD: Envelope = Envelope {
        xmin: -180.0,
        ymin: -90.0,
        xmax: 180.0,
        ymax: 90.0,
    };

    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Boundary-inclusive point test
    pub fn contains_point(&self, point: Point<f64>) -> bool {
        point.x() >= self.xmin
            && point.x() <= self.xmax
            && point.y() >= self.ymin
            && point.y() <= self.ymax
    }

    /// True if `other` lies entirely within this envelope (edges may touch)
    pub fn contains(&self, other: &Envelope) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        !(other.xmax < self.xmin
            || other.xmin > self.xmax
            || other.ymax < self.ymin
            || other.ymin > self.ymax)
    }

    /// Split into four equal quadrants: NW, NE, SW, SE
    pub fn quadrants(&self) -> [Envelope; 4] {
        let mid_x = (self.xmin + self.xmax) / 2.0;
        let mid_y = (self.ymin + self.ymax) / 2.0;
        [
            Envelope::new(self.xmin, mid_y, mid_x, self.ymax),
            Envelope::new(mid_x, mid_y, self.xmax, self.ymax),
            Envelope::new(self.xmin, self.ymin, mid_x, mid_y),
            Envelope::new(mid_x, self.ymin, self.xmax, mid_y),
        ]
    }
}
