//! Statistical analysis algorithms for raster data
//!
//! - **focal**: Moving window (focal) statistics

pub mod focal;

pub use focal::{
    EdgePolicy, FocalParams, FocalStatistic, WindowShape, focal_mean, focal_mean_metric,
    focal_statistics,
};
