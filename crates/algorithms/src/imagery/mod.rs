//! Imagery compositing
//!
//! - Radar: temporal median per orbit pass and polarisation
//! - Optical: scene prefilter, per-pixel quality mask, temporal mean reflectance
//! - Composite: radar and optical bands on one grid, rounded
//! - Indices: NDVI

mod composite;
mod indices;
mod optical;
mod radar;
mod temporal;

pub use composite::{
    CompositeBuilder, CompositeParams, SceneCollections, build_composite, round_decimals,
};
pub use indices::{ndvi, normalized_difference};
pub use optical::{
    OPTICAL_BANDS, OpticalMask, OpticalParams, mask_optical_scene, optical_composite,
    qualifying_optical_scenes,
};
pub use radar::{
    RADAR_PASSES, RADAR_POLARISATIONS, RadarParams, qualifying_radar_scenes, radar_band_name,
    radar_composite,
};
pub use temporal::{Reducer, temporal_reduce};
