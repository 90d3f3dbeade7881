//! # moundscan core
//!
//! Core types and I/O shared by the mound detection engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced single-band grid
//! - `BandStack`: named, grid-aligned multi-band raster
//! - `Region`: polygon or circular buffer defining the analysis extent
//! - Radar and optical scene types consumed by the composite builder
//! - Vector features for candidate polygons and training labels
//! - GeoTIFF and GeoJSON I/O used by export sinks and file-backed sources

pub mod cancel;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;
pub mod scene;
pub mod vector;

pub use cancel::CancelToken;
pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandStack, GeoTransform, Raster, RasterElement};
pub use region::Region;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
    pub use crate::region::Region;
    pub use crate::Algorithm;
}

/// Core trait for the analytical components.
///
/// Components are pure functions of their input and parameters; every
/// output is a new value and inputs are never mutated.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
