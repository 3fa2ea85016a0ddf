//! Flat feature-class (Esri JSON) parsing, used as the fallback format.

use std::io::Read;

use geo::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
    Winding,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::ParseOutcome;
use crate::models::feature::attributes_from_json;
use crate::models::Feature;

/// Features stay raw so one malformed entry only costs that entry
#[derive(Debug, Deserialize)]
struct FeatureClass {
    #[serde(default)]
    features: Option<Vec<Value>>,
}

/// `null` is accepted wherever a member may be missing
#[derive(Debug, Deserialize)]
struct ClassFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
}

/// Geometry shapes are told apart by their fields, not a type tag
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassGeometry {
    Point { x: f64, y: f64 },
    MultiPoint { points: Vec<Vec<f64>> },
    Polyline { paths: Vec<Vec<Vec<f64>>> },
    Polygon { rings: Vec<Vec<Vec<f64>>> },
}

/// Parse a feature-class document. Never fails; unreadable input is `Empty`.
pub fn parse_esri_json<R: Read>(reader: R) -> ParseOutcome {
    let class: FeatureClass = match serde_json::from_reader(reader) {
        Ok(c) => c,
        Err(e) => {
            warn!("Feature-class parse failed: {}", e);
            return ParseOutcome::Empty;
        }
    };

    let entries = class.features.unwrap_or_default();
    let mut features = Vec::with_capacity(entries.len());
    for entry in entries {
        let feature = match serde_json::from_value::<ClassFeature>(entry) {
            Ok(f) => f,
            Err(e) => {
                debug!("Skipping malformed feature-class feature: {}", e);
                continue;
            }
        };
        let Some(geometry) = feature
            .geometry
            .and_then(|v| serde_json::from_value::<ClassGeometry>(v).ok())
            .and_then(ClassGeometry::into_geometry)
        else {
            debug!("Skipping feature-class feature without a usable geometry");
            continue;
        };
        let attributes = feature
            .attributes
            .as_ref()
            .map(attributes_from_json)
            .unwrap_or_default();
        features.push(Feature::new(geometry, attributes));
    }

    ParseOutcome::from_features(features)
}

impl ClassGeometry {
    fn into_geometry(self) -> Option<Geometry<f64>> {
        let geometry = match self {
            ClassGeometry::Point { x, y } => Geometry::Point(Point::new(x, y)),
            ClassGeometry::MultiPoint { points } => Geometry::MultiPoint(MultiPoint::new(
                points
                    .iter()
                    .map(|p| to_coord(p).map(Point::from))
                    .collect::<Option<Vec<_>>>()?,
            )),
            ClassGeometry::Polyline { paths } => Geometry::MultiLineString(MultiLineString::new(
                paths
                    .iter()
                    .map(|path| to_line_string(path))
                    .collect::<Option<Vec<_>>>()?,
            )),
            ClassGeometry::Polygon { rings } => {
                let rings = rings
                    .iter()
                    .map(|ring| to_line_string(ring))
                    .collect::<Option<Vec<_>>>()?;
                Geometry::MultiPolygon(assemble_parts(rings))
            }
        };
        Some(geometry)
    }
}

/// Extra ordinates (z, m) are ignored
fn to_coord(values: &[f64]) -> Option<Coord<f64>> {
    match values {
        [x, y, ..] => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn to_line_string(path: &[Vec<f64>]) -> Option<LineString<f64>> {
    path.iter()
        .map(|v| to_coord(v))
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}

/// Group rings into polygon parts. Clockwise rings open a new part and
/// counter-clockwise rings become holes of the part before them. Rings are
/// not reoriented.
fn assemble_parts(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for mut ring in rings {
        ring.close();
        match parts.last_mut() {
            Some((_, holes)) if ring.is_ccw() => holes.push(ring),
            _ => parts.push((ring, Vec::new())),
        }
    }

    MultiPolygon::new(
        parts
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}
