//! Error types for moundscan

use thiserror::Error;

/// Main error type for raster, scoring and classification operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// A required collection, region or date range yields no usable data
    #[error("No data: {0}")]
    NoData(String),

    /// Rasters of mismatched grid, resolution or CRS reached a combining step
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Training data lacks class diversity or band values
    #[error("Invalid training samples: {0}")]
    InvalidSample(String),

    /// A window extends past valid data and was not masked
    #[error("Boundary mask error: {0}")]
    BoundaryMask(String),

    /// A configured maximum-work bound was exceeded
    #[error("Resource limit exceeded: {what} = {actual} (limit {limit})")]
    ResourceLimit {
        what: &'static str,
        actual: u64,
        limit: u64,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`]
    pub fn invalid_param(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for moundscan operations
pub type Result<T> = std::result::Result<T, Error>;
