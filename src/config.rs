//! Job configuration.
//!
//! Values come from an optional TOML file, then the command line on top.
//! Column indices here are 0-based.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::error::DensityError;

pub const DEFAULT_KEY_ATTRIBUTE: &str = "NAME";
pub const DEFAULT_FILTER_TEXT: &str = "@EPSG:4326(WGS84)";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// How each point record is read, filtered and labelled
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RecordConfig {
    /// Feature attribute used as the aggregation label
    pub key_attribute: String,
    pub longitude_column: usize,
    pub latitude_column: usize,
    /// `None` disables filtering
    pub filter_column: Option<usize>,
    /// Matched case-insensitively as a substring of the filter column
    pub filter_text: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            key_attribute: DEFAULT_KEY_ATTRIBUTE.to_string(),
            longitude_column: 0,
            latitude_column: 1,
            filter_column: None,
            filter_text: DEFAULT_FILTER_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    pub polygons_path: PathBuf,
    pub points_path: PathBuf,
    pub output_path: PathBuf,
    /// Separator between label and count in the output
    pub separator: String,
    /// Run even if no polygon could be parsed (every point lands outside)
    pub allow_empty_polygons: bool,
    /// Records per work unit
    pub batch_size: usize,
    /// Worker threads; rayon's default when unset
    pub threads: Option<usize>,
    pub record: RecordConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            polygons_path: PathBuf::new(),
            points_path: PathBuf::new(),
            output_path: PathBuf::new(),
            separator: ",".to_string(),
            allow_empty_polygons: false,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            record: RecordConfig::default(),
        }
    }
}

impl JobConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: JobConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), DensityError> {
        if self.batch_size == 0 {
            return Err(DensityError::Config("batch_size must be positive".into()));
        }
        if self.separator.is_empty() {
            return Err(DensityError::Config("separator must not be empty".into()));
        }
        if self.threads == Some(0) {
            return Err(DensityError::Config("threads must be positive".into()));
        }
        if self.record.longitude_column == self.record.latitude_column {
            warn!(
                "Longitude and latitude both read column {}; points will lie on the diagonal",
                self.record.longitude_column
            );
        }
        Ok(())
    }
}
