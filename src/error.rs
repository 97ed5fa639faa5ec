//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, MTL, and GDAL errors, and provides semantic variants
//! for the SEBAL failure taxonomy (missing keys, geometry, anchors, writes).
use thiserror::Error;

use crate::types::{AnchorKind, Product};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MTL reader error: {0}")]
    Mtl(#[from] crate::io::MtlError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Missing metadata key: {0}")]
    MissingMetadataKey(String),

    #[error("Missing reflectance calibration keys for band {band}")]
    MissingCalibrationKeys { band: u8 },

    #[error("Required band {band} was not loaded")]
    MissingBand { band: u8 },

    #[error("Boundary does not intersect raster: {0}")]
    EmptyGeometry(String),

    #[error("{kind} pixel coordinate ({x}, {y}) falls outside the raster grid")]
    OutOfBounds { kind: AnchorKind, x: f64, y: f64 },

    #[error("Malformed {kind} coordinates {input:?}: expected \"easting, northing\"")]
    MalformedCoordinates { kind: AnchorKind, input: String },

    #[error("Processing cancelled by user at {stage}")]
    UserCancelled { stage: String },

    #[error("Failed to write {product}: {reason}")]
    WriteFailure { product: Product, reason: String },

    #[error("Grid mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols} ({what})")]
    GridMismatch {
        what: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Cold and hot anchor temperatures are equal ({ts} K); calibration is undefined")]
    DegenerateAnchors { ts: f64 },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    pub fn write_failure<E: std::fmt::Display>(product: Product, e: E) -> Self {
        Error::WriteFailure {
            product,
            reason: e.to_string(),
        }
    }

    /// True for the graceful-abort case where already written products stay valid.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::UserCancelled { .. })
    }
}
