//! SAR backscatter composite: temporal median per orbit pass and polarisation

use crate::imagery::temporal::{Reducer, temporal_reduce};
use crate::maybe_rayon::*;
use crate::statistics::{EdgePolicy, focal_mean};
use moundscan_core::raster::{BandStack, Raster, Window, resample_nearest};
use moundscan_core::scene::{OrbitPass, Polarisation, RadarScene};
use moundscan_core::{Error, Result};

/// Polarisations every radar scene must carry
pub const RADAR_POLARISATIONS: [Polarisation; 2] = [Polarisation::VV, Polarisation::VH];

/// Passes the composite needs, in band order
pub const RADAR_PASSES: [OrbitPass; 2] = [OrbitPass::Ascending, OrbitPass::Descending];

/// Radar compositing options
#[derive(Debug, Clone, PartialEq)]
pub struct RadarParams {
    /// Required acquisition mode
    pub instrument_mode: String,
    /// Drop pixels whose VV backscatter is not above this level (dB)
    pub noise_floor_db: Option<f64>,
    /// Circular mean smoothing radius (ground units) applied per scene
    pub speckle_radius: Option<f64>,
}

impl Default for RadarParams {
    fn default() -> Self {
        Self {
            instrument_mode: "IW".to_string(),
            noise_floor_db: None,
            speckle_radius: None,
        }
    }
}

/// Composite band name for a pass and polarisation, e.g. `s1vva`
pub fn radar_band_name(pass: OrbitPass, pol: Polarisation) -> String {
    format!("s1{}{}", pol.band_name().to_lowercase(), pass.suffix())
}

/// Scenes usable for compositing: matching mode with both polarisations present
pub fn qualifying_radar_scenes<'a>(
    scenes: &'a [RadarScene],
    params: &RadarParams,
) -> Vec<&'a RadarScene> {
    scenes
        .iter()
        .filter(|s| s.instrument_mode == params.instrument_mode)
        .filter(|s| s.has_polarisations(&RADAR_POLARISATIONS))
        .collect()
}

/// Build the four radar bands `s1vva, s1vha, s1vvd, s1vhd` on the `template` grid.
///
/// # Errors
/// * `NoData` if either pass has no qualifying scene
/// * `Alignment` if a scene's CRS differs from the template's
pub fn radar_composite(
    scenes: &[RadarScene],
    template: &Raster<f64>,
    params: &RadarParams,
) -> Result<BandStack> {
    let qualifying = qualifying_radar_scenes(scenes, params);

    let mut out = BandStack::new();
    for pass in RADAR_PASSES {
        let selected: Vec<&RadarScene> = qualifying.iter().copied().filter(|s| s.pass == pass).collect();
        if selected.is_empty() {
            return Err(Error::NoData(format!(
                "no {} radar scenes with VV and VH in mode {}",
                pass, params.instrument_mode
            )));
        }

        let prepared: Vec<BandStack> = selected
            .into_par_iter()
            .map(|scene| prepare_scene(scene, template, params))
            .collect::<Result<Vec<_>>>()?;

        for pol in RADAR_POLARISATIONS {
            let series: Vec<Raster<f64>> = prepared
                .iter()
                .map(|s| s.band(pol.band_name()).cloned())
                .collect::<Result<Vec<_>>>()?;
            let median = temporal_reduce(&series, Reducer::Median)?;
            out.push(radar_band_name(pass, pol), median)?;
        }
    }
    Ok(out)
}

/// Resample one scene onto the template, then apply noise floor and speckle filter
fn prepare_scene(scene: &RadarScene, template: &Raster<f64>, params: &RadarParams) -> Result<BandStack> {
    let mut vv = resample_nearest(scene.bands.band(Polarisation::VV.band_name())?, template)?;
    let mut vh = resample_nearest(scene.bands.band(Polarisation::VH.band_name())?, template)?;

    if let Some(floor) = params.noise_floor_db {
        let keep = vv.map(|v| u8::from(v > floor));
        vv = vv.zip_map(&keep, |v, k| if k == 1 { v } else { f64::NAN })?;
        vh = vh.zip_map(&keep, |v, k| if k == 1 { v } else { f64::NAN })?;
    }

    if let Some(radius) = params.speckle_radius {
        let window = Window::circle_ground(radius, template.cell_size())?;
        vv = focal_mean(&vv, &window, EdgePolicy::Truncate)?;
        vh = focal_mean(&vh, &window, EdgePolicy::Truncate)?;
    }

    BandStack::from_bands([
        (Polarisation::VV.band_name(), vv),
        (Polarisation::VH.band_name(), vh),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use moundscan_core::{CRS, GeoTransform};

    fn grid() -> Raster<f64> {
        Raster::filled(6, 6, 0.0)
            .with_transform(GeoTransform::north_up(0.0, 60.0, 10.0))
            .with_crs(CRS::utm(15, true))
    }

    fn scene(id: &str, pass: OrbitPass, vv: f64, vh: f64) -> RadarScene {
        RadarScene {
            id: id.into(),
            acquired: NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
            pass,
            instrument_mode: "IW".into(),
            bands: BandStack::from_bands([
                ("VV", grid().map(move |_| vv)),
                ("VH", grid().map(move |_| vh)),
            ])
            .unwrap(),
        }
    }

    #[test]
    fn test_four_bands_from_both_passes() {
        let scenes = vec![
            scene("a1", OrbitPass::Ascending, -10.0, -17.0),
            scene("a2", OrbitPass::Ascending, -12.0, -19.0),
            scene("a3", OrbitPass::Ascending, -30.0, -40.0),
            scene("d1", OrbitPass::Descending, -8.0, -15.0),
        ];
        let out = radar_composite(&scenes, &grid(), &RadarParams::default()).unwrap();
        assert_eq!(out.names(), &["s1vva", "s1vha", "s1vvd", "s1vhd"]);
        assert_eq!(out.band("s1vva").unwrap().get(3, 3).unwrap(), -12.0);
        assert_eq!(out.band("s1vha").unwrap().get(3, 3).unwrap(), -19.0);
        assert_eq!(out.band("s1vvd").unwrap().get(0, 0).unwrap(), -8.0);
    }

    #[test]
    fn test_missing_descending_pass_is_no_data() {
        let scenes = vec![
            scene("a1", OrbitPass::Ascending, -10.0, -17.0),
            scene("a2", OrbitPass::Ascending, -11.0, -18.0),
        ];
        let err = radar_composite(&scenes, &grid(), &RadarParams::default()).unwrap_err();
        assert!(matches!(err, Error::NoData(_)), "got {:?}", err);
    }

    #[test]
    fn test_mode_and_polarisation_filter() {
        let mut ew = scene("d-ew", OrbitPass::Descending, -8.0, -15.0);
        ew.instrument_mode = "EW".into();
        let mut single = scene("d-vv", OrbitPass::Descending, -8.0, -15.0);
        single.bands = single.bands.select(&["VV"]).unwrap();
        let scenes = vec![scene("a1", OrbitPass::Ascending, -10.0, -17.0), ew, single];

        assert_eq!(qualifying_radar_scenes(&scenes, &RadarParams::default()).len(), 1);
        assert!(matches!(
            radar_composite(&scenes, &grid(), &RadarParams::default()),
            Err(Error::NoData(_))
        ));
    }

    #[test]
    fn test_noise_floor_masks_both_polarisations() {
        let scenes = vec![
            scene("a1", OrbitPass::Ascending, -35.0, -40.0),
            scene("a2", OrbitPass::Ascending, -9.0, -16.0),
            scene("d1", OrbitPass::Descending, -31.0, -38.0),
        ];
        let params = RadarParams {
            noise_floor_db: Some(-30.0),
            ..Default::default()
        };
        let out = radar_composite(&scenes, &grid(), &params).unwrap();
        assert_eq!(out.band("s1vva").unwrap().get(1, 1).unwrap(), -9.0);
        assert_eq!(out.band("s1vha").unwrap().get(1, 1).unwrap(), -16.0);
        assert!(out.band("s1vvd").unwrap().get(1, 1).unwrap().is_nan());
    }
}
