//! Error types shared by the library modules.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DensityError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("No polygon features could be parsed from {source_name}")]
    NoFeatures { source_name: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DensityError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DensityError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DensityError>;
