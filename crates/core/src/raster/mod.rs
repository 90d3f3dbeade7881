//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod neighborhood;
mod resample;
mod stack;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use neighborhood::{Neighborhood, Window};
pub use resample::resample_nearest;
pub use stack::BandStack;
