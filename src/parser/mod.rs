//! Polygon feature parsing.
//!
//! Polygon documents come in two shapes: GeoJSON collections and flat
//! Esri feature-class JSON. The GeoJSON parser is tried first; when it
//! yields nothing the source is re-opened from the start and handed to the
//! feature-class parser.

mod esri;
mod geojson;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::error::{DensityError, Result};
use crate::models::Feature;

pub use esri::parse_esri_json;
pub use geojson::parse_geojson;

/// Result of a single parse attempt. `Empty` tells the caller to try the
/// alternate format.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(Vec<Feature>),
    Empty,
}

impl ParseOutcome {
    pub(crate) fn from_features(features: Vec<Feature>) -> Self {
        if features.is_empty() {
            ParseOutcome::Empty
        } else {
            ParseOutcome::Parsed(features)
        }
    }

    pub fn into_features(self) -> Vec<Feature> {
        match self {
            ParseOutcome::Parsed(features) => features,
            ParseOutcome::Empty => Vec::new(),
        }
    }
}

/// A byte source that can be read from the start more than once
pub trait FeatureSource {
    fn open(&self) -> Result<Box<dyn Read + '_>>;

    /// Human-readable name for logs and errors
    fn describe(&self) -> String;
}

/// A polygon file on disk; `.gz` files are decompressed transparently
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for FileSource {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path).map_err(|e| DensityError::io(&self.path, e))?;
        let reader: Box<dyn Read> = if self.path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(reader)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl FeatureSource for [u8] {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(self))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.len())
    }
}

/// Run the two-stage parse against `source`.
///
/// An unreadable source is an error. A readable source that neither format
/// can make sense of yields an empty list; deciding whether that is fatal is
/// left to the caller.
pub fn load_features<S: FeatureSource + ?Sized>(source: &S) -> Result<Vec<Feature>> {
    let name = source.describe();

    if let ParseOutcome::Parsed(features) = parse_geojson(source.open()?) {
        info!("Parsed {} GeoJSON features from {}", features.len(), name);
        return Ok(features);
    }

    info!("No GeoJSON features in {}, trying feature-class JSON", name);
    let features = parse_esri_json(source.open()?).into_features();

    if features.is_empty() {
        warn!("No features could be parsed from {}", name);
    } else {
        info!(
            "Parsed {} feature-class features from {}",
            features.len(),
            name
        );
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    /// Counts how many times the source was opened
    struct CountingSource<'a> {
        bytes: &'a [u8],
        opens: Cell<usize>,
    }

    impl FeatureSource for CountingSource<'_> {
        fn open(&self) -> Result<Box<dyn Read + '_>> {
            self.opens.set(self.opens.get() + 1);
            Ok(Box::new(self.bytes))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_geojson_parsed_without_fallback() {
        let doc = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}
        ]}"#;
        let source = CountingSource {
            bytes: doc,
            opens: Cell::new(0),
        };
        let features = load_features(&source).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(source.opens.get(), 1);
    }

    #[test]
    fn test_fallback_reopens_source() {
        let doc = br#"{"features":[
            {"geometry":{"rings":[[[0,0],[0,1],[1,1],[1,0],[0,0]]]},"attributes":{"NAME":"A"}}
        ]}"#;
        let source = CountingSource {
            bytes: doc,
            opens: Cell::new(0),
        };
        let features = load_features(&source).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(source.opens.get(), 2);
    }

    #[test]
    fn test_fallback_tolerates_null_attributes() {
        let doc = br#"{"features":[
            {"geometry":{"rings":[[[0,0],[0,1],[1,1],[1,0],[0,0]]]},"attributes":{"NAME":"A"}},
            {"geometry":{"rings":[[[2,2],[2,3],[3,3],[3,2],[2,2]]]},"attributes":null}
        ]}"#;
        let features = load_features(&doc[..]).unwrap();
        assert_eq!(features.len(), 2);
        assert!(features[1].attribute("NAME").is_none());
    }

    #[test]
    fn test_both_formats_empty() {
        let source = CountingSource {
            bytes: b"this is not json",
            opens: Cell::new(0),
        };
        let features = load_features(&source).unwrap();
        assert!(features.is_empty());
        assert_eq!(source.opens.get(), 2);
    }

    #[test]
    fn test_in_memory_source() {
        let doc: &[u8] =
            br#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}]}"#;
        assert_eq!(load_features(doc).unwrap().len(), 1);
    }

    #[test]
    fn test_gzip_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polygons.json.gz");
        let doc = br#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{"NAME":"gz"}}]}"#;

        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(doc).unwrap();
        encoder.finish().unwrap();

        let features = load_features(&FileSource::new(&path)).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_features(&FileSource::new("/nonexistent/polygons.json"));
        assert!(matches!(result, Err(DensityError::Io { .. })));
    }
}
