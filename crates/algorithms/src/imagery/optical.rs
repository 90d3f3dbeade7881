//! Cloud-masked optical reflectance composite

use crate::imagery::temporal::{Reducer, temporal_reduce};
use crate::maybe_rayon::*;
use moundscan_core::raster::{BandStack, Raster, resample_nearest};
use moundscan_core::scene::OpticalScene;
use moundscan_core::{Error, Result};

/// QA60 bit flagging opaque clouds
const QA60_CLOUD_BIT: u32 = 1 << 10;
/// QA60 bit flagging cirrus
const QA60_CIRRUS_BIT: u32 = 1 << 11;
/// SCL classes kept by the surface-reflectance mask: vegetation, bare soil
const SCL_KEEP: [u8; 2] = [4, 5];

/// Reflectance bands averaged into the composite
pub const OPTICAL_BANDS: [&str; 10] = [
    "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B11", "B12",
];

/// Per-pixel quality mask variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpticalMask {
    /// Top-of-atmosphere product: clear iff QA60 cloud and cirrus bits are 0
    #[default]
    Qa60,
    /// Surface reflectance product: keep only SCL vegetation and bare soil
    Scl,
}

impl OpticalMask {
    /// Quality band the mask reads
    pub fn band_name(&self) -> &'static str {
        match self {
            OpticalMask::Qa60 => "QA60",
            OpticalMask::Scl => "SCL",
        }
    }

    /// Whether a quality value marks a usable pixel
    pub fn is_clear(&self, quality: f64) -> bool {
        if !quality.is_finite() || quality < 0.0 {
            return false;
        }
        match self {
            OpticalMask::Qa60 => (quality as u32) & (QA60_CLOUD_BIT | QA60_CIRRUS_BIT) == 0,
            OpticalMask::Scl => SCL_KEEP.contains(&(quality as u8)),
        }
    }
}

/// Optical compositing options
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalParams {
    /// Bands to average, in output order
    pub bands: Vec<String>,
    /// Scenes must report a cloudy pixel percentage below this value
    pub cloud_filter_pct: f64,
    pub mask: OpticalMask,
    /// Digital numbers per unit reflectance
    pub scale: f64,
}

impl Default for OpticalParams {
    fn default() -> Self {
        Self {
            bands: OPTICAL_BANDS.iter().map(|b| b.to_string()).collect(),
            cloud_filter_pct: 20.0,
            mask: OpticalMask::Qa60,
            scale: 10_000.0,
        }
    }
}

/// Scenes passing the scene-level cloud cover prefilter
pub fn qualifying_optical_scenes<'a>(
    scenes: &'a [OpticalScene],
    params: &OpticalParams,
) -> Vec<&'a OpticalScene> {
    scenes
        .iter()
        .filter(|s| s.cloudy_pixel_percentage < params.cloud_filter_pct)
        .collect()
}

/// Mask one scene by its quality band and rescale to reflectance on the `template` grid
pub fn mask_optical_scene(
    scene: &OpticalScene,
    template: &Raster<f64>,
    params: &OpticalParams,
) -> Result<BandStack> {
    let quality = scene
        .bands
        .band(params.mask.band_name())
        .map_err(|_| Error::NoData(format!("scene {} lacks {}", scene.id, params.mask.band_name())))?;
    let quality = resample_nearest(quality, template)?;
    let mask = params.mask;
    let clear = quality.map(|q| u8::from(mask.is_clear(q)));

    let mut out = BandStack::new();
    for name in &params.bands {
        let band = scene
            .bands
            .band(name)
            .map_err(|_| Error::NoData(format!("scene {} lacks band {}", scene.id, name)))?;
        let band = resample_nearest(band, template)?;
        let scale = params.scale;
        let masked = band.zip_map(&clear, |v, c| if c == 1 { v / scale } else { f64::NAN })?;
        out.push(name.as_str(), masked)?;
    }
    Ok(out)
}

/// Temporal mean of cloud-masked reflectance for every configured band.
///
/// # Errors
/// * `NoData` if no scene passes the cloud cover prefilter
pub fn optical_composite(
    scenes: &[OpticalScene],
    template: &Raster<f64>,
    params: &OpticalParams,
) -> Result<BandStack> {
    if !(params.scale > 0.0) {
        return Err(Error::invalid_param("scale", params.scale, "must be positive"));
    }
    let qualifying = qualifying_optical_scenes(scenes, params);
    if qualifying.is_empty() {
        return Err(Error::NoData(format!(
            "no optical scenes below {}% cloud cover ({} offered)",
            params.cloud_filter_pct,
            scenes.len()
        )));
    }

    let masked: Vec<BandStack> = qualifying
        .into_par_iter()
        .map(|scene| mask_optical_scene(scene, template, params))
        .collect::<Result<Vec<_>>>()?;

    let mut out = BandStack::new();
    for name in &params.bands {
        let series: Vec<Raster<f64>> = masked
            .iter()
            .map(|s| s.band(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        out.push(name.as_str(), temporal_reduce(&series, Reducer::Mean)?)?;
    }
    Ok(out)
}
