//! Multi-sensor composite: radar medians + optical means on one grid

use crate::imagery::indices::ndvi;
use crate::imagery::optical::{OpticalParams, optical_composite};
use crate::imagery::radar::{RadarParams, radar_composite};
use moundscan_core::raster::{BandStack, Raster};
use moundscan_core::scene::{OpticalScene, RadarScene};
use moundscan_core::{Algorithm, Error, Result};

/// Composite builder options
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeParams {
    pub radar: RadarParams,
    pub optical: OpticalParams,
    /// Decimal places kept in every composite value
    pub decimals: u32,
    /// Append `NDVI = (B8 - B4) / (B8 + B4)` from the optical mean
    pub append_ndvi: bool,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            radar: RadarParams::default(),
            optical: OpticalParams::default(),
            decimals: 4,
            append_ndvi: false,
        }
    }
}

/// Scene collections feeding one composite
#[derive(Debug, Clone, Default)]
pub struct SceneCollections {
    pub radar: Vec<RadarScene>,
    pub optical: Vec<OpticalScene>,
}

/// Round to a fixed number of decimal places, half away from zero
pub fn round_decimals(raster: &Raster<f64>, decimals: u32) -> Raster<f64> {
    let factor = 10f64.powi(decimals as i32);
    let mut out = raster.map(|v| (v * factor).round() / factor);
    out.set_nodata(Some(f64::NAN));
    out
}

/// Build the composite on `template`'s grid; cells where the template is NaN
/// (outside the region) are NaN in every band.
///
/// Band order: `s1vva, s1vha, s1vvd, s1vhd`, the optical bands, then `NDVI`
/// when requested.
///
/// # Errors
/// * `NoData` if either sensor has no qualifying scene, or a band has no
///   valid pixel inside the template
pub fn build_composite(
    scenes: &SceneCollections,
    template: &Raster<f64>,
    params: &CompositeParams,
) -> Result<BandStack> {
    if params.decimals > 12 {
        return Err(Error::invalid_param("decimals", params.decimals, "at most 12"));
    }

    let radar = radar_composite(&scenes.radar, template, &params.radar)?;
    let mut optical = optical_composite(&scenes.optical, template, &params.optical)?;

    if params.append_ndvi {
        let index = ndvi(optical.band("B8")?, optical.band("B4")?)?;
        optical.push("NDVI", index)?;
    }

    let composite = radar.cat(optical)?.map_bands(|band| {
        let clipped = band.zip_map(template, |v, t| if t.is_nan() { f64::NAN } else { v })?;
        Ok(round_decimals(&clipped, params.decimals))
    })?;

    if let Some((name, _)) = composite
        .iter()
        .find(|(_, band)| !band.data().iter().any(|v| v.is_finite()))
    {
        return Err(Error::NoData(format!(
            "composite band {} has no valid pixel in the region",
            name
        )));
    }
    Ok(composite)
}

/// Composite builder
#[derive(Debug, Clone, Default)]
pub struct CompositeBuilder;

impl Algorithm for CompositeBuilder {
    type Input = (SceneCollections, Raster<f64>);
    type Output = BandStack;
    type Params = CompositeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Composite"
    }

    fn description(&self) -> &'static str {
        "Temporal SAR medians per pass/polarisation and cloud-masked optical means"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        build_composite(&input.0, &input.1, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::optical::OPTICAL_BANDS;
    use chrono::NaiveDate;
    use moundscan_core::scene::OrbitPass;
    use moundscan_core::{GeoTransform, Region};

    fn template() -> Raster<f64> {
        Region::buffer((20.0, 20.0), 15.0).unwrap().grid(10.0, None).unwrap()
    }

    fn fill(v: f64) -> Raster<f64> {
        Raster::filled(4, 4, v).with_transform(GeoTransform::north_up(0.0, 40.0, 10.0))
    }

    fn collections() -> SceneCollections {
        let date = NaiveDate::from_ymd_opt(2021, 3, 3).unwrap();
        let radar = [OrbitPass::Ascending, OrbitPass::Descending]
            .into_iter()
            .map(|pass| RadarScene {
                id: format!("{}", pass),
                acquired: date,
                pass,
                instrument_mode: "IW".into(),
                bands: BandStack::from_bands([("VV", fill(-11.123456)), ("VH", fill(-18.0))]).unwrap(),
            })
            .collect();
        let mut bands = BandStack::new();
        for name in OPTICAL_BANDS {
            let dn = if name == "B8" { 3000.0 } else { 1000.0 };
            bands.push(name, fill(dn)).unwrap();
        }
        bands.push("QA60", fill(0.0)).unwrap();
        let optical = vec![OpticalScene {
            id: "s2".into(),
            acquired: date,
            cloudy_pixel_percentage: 1.0,
            bands,
        }];
        SceneCollections { radar, optical }
    }

    #[test]
    fn test_band_order_rounding_and_region_mask() {
        let params = CompositeParams {
            append_ndvi: true,
            ..Default::default()
        };
        let t = template();
        let out = build_composite(&collections(), &t, &params).unwrap();

        let names: Vec<&str> = out.names().iter().map(String::as_str).collect();
        assert_eq!(&names[..4], &["s1vva", "s1vha", "s1vvd", "s1vhd"]);
        assert_eq!(names[4], "B2");
        assert_eq!(*names.last().unwrap(), "NDVI");
        assert_eq!(out.len(), 15);

        assert_eq!(out.band("s1vva").unwrap().get(1, 1).unwrap(), -11.1235);
        assert_eq!(out.band("NDVI").unwrap().get(1, 1).unwrap(), 0.5);
        // corner cell center lies outside the 15 m buffer
        assert!(out.band("B2").unwrap().get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_missing_optical_is_no_data() {
        let mut scenes = collections();
        scenes.optical.clear();
        assert!(matches!(
            build_composite(&scenes, &template(), &CompositeParams::default()),
            Err(Error::NoData(_))
        ));
    }

    #[test]
    fn test_off_region_scene_is_no_data() {
        let mut scenes = collections();
        let far = Raster::filled(4, 4, -9.0).with_transform(GeoTransform::north_up(5_000.0, 5_040.0, 10.0));
        scenes.radar[1].bands = BandStack::from_bands([("VV", far.clone()), ("VH", far)]).unwrap();

        let err = build_composite(&scenes, &template(), &CompositeParams::default()).unwrap_err();
        match err {
            Error::NoData(msg) => assert!(msg.contains("s1vvd"), "got {}", msg),
            other => panic!("expected NoData, got {:?}", other),
        }
    }

    #[test]
    fn test_round_decimals() {
        let r = Raster::from_vec(vec![0.123449, -0.00006, 2.5, f64::NAN], 2, 2).unwrap();
        let out = round_decimals(&r, 4);
        assert_eq!(out.get(0, 0).unwrap(), 0.1234);
        assert_eq!(out.get(0, 1).unwrap(), -0.0001);
        assert_eq!(out.get(1, 0).unwrap(), 2.5);
        assert!(out.get(1, 1).unwrap().is_nan());
    }
}
