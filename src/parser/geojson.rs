//! GeoJSON FeatureCollection / GeometryCollection parsing.

use std::io::Read;

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::Value;
use tracing::{debug, warn};

use super::ParseOutcome;
use crate::error::{DensityError, Result};
use crate::models::feature::attributes_from_json;
use crate::models::{Attributes, Feature};

const FEATURE: &str = "Feature";
const FEATURE_COLLECTION: &str = "FeatureCollection";
const GEOMETRY_COLLECTION: &str = "GeometryCollection";

/// Parse a GeoJSON document into features.
///
/// Never fails: anything that is not a well-formed collection (including a
/// single bad geometry inside one) comes back as `ParseOutcome::Empty`.
pub fn parse_geojson<R: Read>(reader: R) -> ParseOutcome {
    let root: Value = match serde_json::from_reader(reader) {
        Ok(v) => v,
        Err(e) => {
            debug!("Not a JSON document: {}", e);
            return ParseOutcome::Empty;
        }
    };

    match parse_document(&root) {
        Ok(features) => ParseOutcome::from_features(features),
        Err(e) => {
            warn!("GeoJSON parse failed: {}", e);
            ParseOutcome::Empty
        }
    }
}

fn parse_document(root: &Value) -> Result<Vec<Feature>> {
    match root.get("type").and_then(Value::as_str) {
        Some(FEATURE_COLLECTION) => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("FeatureCollection without a features array"))?;
            parse_features(features)
        }
        Some(GEOMETRY_COLLECTION) => {
            let geometries = root
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("GeometryCollection without a geometries array"))?;
            let parsed = geometries
                .iter()
                .map(parse_geometry)
                .collect::<Result<Vec<_>>>()?;
            // Bare geometries carry no attributes to aggregate by
            debug!(
                "Discarding {} unattributed geometries from GeometryCollection",
                parsed.len()
            );
            Ok(Vec::new())
        }
        _ => Ok(Vec::new()),
    }
}

fn parse_features(features: &[Value]) -> Result<Vec<Feature>> {
    let mut out = Vec::with_capacity(features.len());

    for feature in features {
        if feature.get("type").and_then(Value::as_str) != Some(FEATURE) {
            continue;
        }

        let geometry = parse_geometry(feature.get("geometry").unwrap_or(&Value::Null))?;
        let attributes = feature
            .get("properties")
            .and_then(Value::as_object)
            .map(attributes_from_json)
            .unwrap_or_else(Attributes::new);

        out.push(Feature::new(geometry, attributes));
    }

    Ok(out)
}

/// Parse a geometry object by its `type` tag.
pub(crate) fn parse_geometry(node: &Value) -> Result<Geometry<f64>> {
    let coordinates = node.get("coordinates").unwrap_or(&Value::Null);

    let geometry = match node.get("type").and_then(Value::as_str) {
        Some("MultiPoint") => Geometry::MultiPoint(parse_multi_point(coordinates)?),
        Some("LineString") => Geometry::LineString(parse_line_string(coordinates)?),
        Some("MultiLineString") => Geometry::MultiLineString(parse_multi_line_string(coordinates)?),
        Some("Polygon") => Geometry::Polygon(parse_polygon(coordinates)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(parse_multi_polygon(coordinates)?),
        Some("Point") => Geometry::Point(parse_point(coordinates)?),
        other => {
            // Unknown or missing tags are read as points
            debug!("Geometry type {:?} parsed as Point", other);
            Geometry::Point(parse_point(coordinates)?)
        }
    };

    Ok(geometry)
}

/// A position of 2 or 3 ordinates; z is validated and dropped
pub(crate) fn parse_position(node: &Value) -> Result<Coord<f64>> {
    let ordinates = as_array(node, "position")?;
    if !(2..=3).contains(&ordinates.len()) {
        return Err(invalid(format!(
            "position must have 2 or 3 ordinates, got {}",
            ordinates.len()
        )));
    }

    let mut values = [0.0; 3];
    for (slot, ordinate) in values.iter_mut().zip(ordinates) {
        *slot = ordinate
            .as_f64()
            .ok_or_else(|| invalid(format!("non-numeric ordinate {}", ordinate)))?;
    }

    Ok(Coord {
        x: values[0],
        y: values[1],
    })
}

fn parse_point(node: &Value) -> Result<Point<f64>> {
    parse_position(node).map(Point::from)
}

fn parse_multi_point(node: &Value) -> Result<MultiPoint<f64>> {
    as_array(node, "MultiPoint")?
        .iter()
        .map(parse_point)
        .collect::<Result<Vec<_>>>()
        .map(MultiPoint::new)
}

fn parse_line_string(node: &Value) -> Result<LineString<f64>> {
    as_array(node, "LineString")?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn parse_multi_line_string(node: &Value) -> Result<MultiLineString<f64>> {
    as_array(node, "MultiLineString")?
        .iter()
        .map(parse_line_string)
        .collect::<Result<Vec<_>>>()
        .map(MultiLineString::new)
}

/// First ring is the exterior, the rest are holes. Rings are closed by
/// `Polygon::new`; vertex order is kept as given.
fn parse_polygon(node: &Value) -> Result<Polygon<f64>> {
    let mut rings = as_array(node, "Polygon")?
        .iter()
        .map(parse_line_string)
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

fn parse_multi_polygon(node: &Value) -> Result<MultiPolygon<f64>> {
    as_array(node, "MultiPolygon")?
        .iter()
        .map(parse_polygon)
        .collect::<Result<Vec<_>>>()
        .map(MultiPolygon::new)
}

fn as_array<'a>(node: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    node.as_array()
        .ok_or_else(|| invalid(format!("{} coordinates must be an array", what)))
}

fn invalid(msg: impl Into<String>) -> DensityError {
    DensityError::InvalidGeometry(msg.into())
}
