//! Multi-radius local relief
//!
//! Relief at radius r is the elevation of a cell minus the mean elevation of
//! all cells within r (ground distance, center to center, the cell itself
//! included):
//!
//!   relief_r = z - mean(z within r)
//!
//! Positive relief marks a local high such as a mound top, negative relief a
//! depression. A cell whose disk leaves the raster or covers a NaN cell is
//! invalid (NaN) at that radius.

use crate::maybe_rayon::*;
use crate::statistics::focal_mean_metric;
use moundscan_core::raster::{BandStack, Raster};
use moundscan_core::{Algorithm, Error, Result};

/// Ordered, strictly increasing set of positive analysis radii (ground units)
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusSet(Vec<f64>);

impl RadiusSet {
    pub fn new(radii: Vec<f64>) -> Result<Self> {
        if radii.is_empty() {
            return Err(Error::invalid_param("radii", "[]", "at least one radius required"));
        }
        if let Some(r) = radii.iter().find(|r| !(**r > 0.0) || !r.is_finite()) {
            return Err(Error::invalid_param("radii", r, "radii must be positive"));
        }
        if radii.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::invalid_param(
                "radii",
                format!("{:?}", radii),
                "radii must be strictly increasing",
            ));
        }
        Ok(Self(radii))
    }

    pub fn radii(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn smallest(&self) -> f64 {
        self.0[0]
    }

    pub fn largest(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Band name used for the relief at `radius`
    pub fn band_name(radius: f64) -> String {
        format!("relief_{}", radius)
    }
}

impl Default for RadiusSet {
    fn default() -> Self {
        Self(vec![10.0, 15.0, 20.0, 25.0, 30.0])
    }
}

/// One relief band per radius, in radius order
#[derive(Debug, Clone)]
pub struct ReliefStack {
    radii: RadiusSet,
    bands: BandStack,
}

impl ReliefStack {
    pub fn radii(&self) -> &RadiusSet {
        &self.radii
    }

    pub fn bands(&self) -> &BandStack {
        &self.bands
    }

    /// Relief band at the i-th radius
    pub fn band_at(&self, index: usize) -> &Raster<f64> {
        &self.bands.bands()[index]
    }

    /// Relief band at the largest radius
    pub fn largest(&self) -> &Raster<f64> {
        self.band_at(self.radii.len() - 1)
    }

    /// Relief values of every radius at one cell
    pub fn profile(&self, row: usize, col: usize) -> Result<Vec<f64>> {
        self.bands.pixel(row, col)
    }

    pub fn into_bands(self) -> BandStack {
        self.bands
    }
}

/// Relief stack algorithm
#[derive(Debug, Clone, Default)]
pub struct ReliefAnalyzer;

impl Algorithm for ReliefAnalyzer {
    type Input = Raster<f64>;
    type Output = ReliefStack;
    type Params = RadiusSet;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Relief"
    }

    fn description(&self) -> &'static str {
        "Elevation minus circular neighborhood mean at several radii"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        relief_stack(&input, &params)
    }
}

/// Compute the relief stack of a DEM
///
/// # Arguments
/// * `dem` - Elevation raster on a projected grid (NaN = no data)
/// * `radii` - Analysis radii in ground units
///
/// # Errors
/// * `InvalidParameter` if the CRS is geographic or a radius is below one cell
/// * `BoundaryMask` if some radius leaves no cell with a complete window
pub fn relief_stack(dem: &Raster<f64>, radii: &RadiusSet) -> Result<ReliefStack> {
    if let Some(crs) = dem.crs()
        && crs.is_geographic()
    {
        return Err(Error::invalid_param(
            "crs",
            crs,
            "relief radii are ground distances; use a projected CRS",
        ));
    }
    let cell = dem.cell_size();
    if radii.smallest() < cell {
        return Err(Error::invalid_param(
            "radii",
            radii.smallest(),
            format!("radius below the {} cell size", cell),
        ));
    }

    let bands: Vec<Raster<f64>> = radii
        .radii()
        .to_vec()
        .into_par_iter()
        .map(|r| relief_band(dem, r))
        .collect::<Result<Vec<_>>>()?;

    let bands = BandStack::from_bands(
        radii
            .radii()
            .iter()
            .map(|&r| RadiusSet::band_name(r))
            .zip(bands),
    )?;

    Ok(ReliefStack {
        radii: radii.clone(),
        bands,
    })
}

fn relief_band(dem: &Raster<f64>, radius: f64) -> Result<Raster<f64>> {
    let mean = focal_mean_metric(dem, radius)?;
    let mut relief = dem.zip_map(&mean, |z, m| z - m)?;
    relief.set_nodata(Some(f64::NAN));

    if relief.data().iter().all(|v| v.is_nan()) {
        return Err(Error::BoundaryMask(format!(
            "radius {} leaves no cell with a complete window on a {}x{} grid",
            radius,
            dem.rows(),
            dem.cols()
        )));
    }
    Ok(relief)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moundscan_core::{CRS, GeoTransform};

    fn flat(size: usize, cell: f64, z: f64) -> Raster<f64> {
        let mut r = Raster::filled(size, size, z);
        r.set_transform(GeoTransform::north_up(0.0, size as f64 * cell, cell));
        r
    }

    #[test]
    fn test_radius_set_validation() {
        assert!(RadiusSet::new(vec![10.0, 15.0, 20.0]).is_ok());
        assert!(RadiusSet::new(vec![]).is_err());
        assert!(RadiusSet::new(vec![10.0, 10.0]).is_err());
        assert!(RadiusSet::new(vec![15.0, 10.0]).is_err());
        assert!(RadiusSet::new(vec![-1.0, 10.0]).is_err());
        assert_eq!(RadiusSet::default().largest(), 30.0);
    }

    #[test]
    fn test_flat_terrain_has_zero_relief() {
        let dem = flat(40, 2.0, 100.0);
        let stack = relief_stack(&dem, &RadiusSet::new(vec![4.0, 8.0]).unwrap()).unwrap();
        assert_eq!(
            stack.bands().names(),
            &["relief_4".to_string(), "relief_8".to_string()]
        );
        assert_eq!(stack.band_at(0).get(20, 20).unwrap(), 0.0);
        assert_eq!(stack.largest().get(20, 20).unwrap(), 0.0);
    }

    #[test]
    fn test_boundary_cells_are_masked() {
        let dem = flat(40, 2.0, 100.0);
        let stack = relief_stack(&dem, &RadiusSet::new(vec![10.0]).unwrap()).unwrap();
        // 10 m at 2 m cells: 5 cells to every side
        assert!(stack.band_at(0).get(4, 20).unwrap().is_nan());
        assert!(stack.band_at(0).get(20, 35).unwrap().is_nan());
        assert!(!stack.band_at(0).get(5, 34).unwrap().is_nan());
    }

    #[test]
    fn test_nodata_hole_masks_its_neighborhood() {
        let mut dem = flat(30, 1.0, 50.0);
        dem.set(15, 15, f64::NAN).unwrap();
        let stack = relief_stack(&dem, &RadiusSet::new(vec![3.0]).unwrap()).unwrap();
        assert!(stack.band_at(0).get(15, 18).unwrap().is_nan());
        assert!(!stack.band_at(0).get(15, 19).unwrap().is_nan());
    }

    #[test]
    fn test_peak_is_positive_relief() {
        let mut dem = flat(21, 1.0, 10.0);
        dem.set(10, 10, 19.0).unwrap();
        let stack = relief_stack(&dem, &RadiusSet::new(vec![1.0]).unwrap()).unwrap();
        // 5-cell disk: mean = (19 + 4*10) / 5
        let v = stack.band_at(0).get(10, 10).unwrap();
        assert!((v - (19.0 - 59.0 / 5.0)).abs() < 1e-10, "got {}", v);
        assert!(stack.band_at(0).get(10, 11).unwrap() < 0.0);
    }

    #[test]
    fn test_window_larger_than_raster_is_boundary_error() {
        let dem = flat(10, 1.0, 1.0);
        let err = relief_stack(&dem, &RadiusSet::new(vec![2.0, 6.0]).unwrap()).unwrap_err();
        assert!(matches!(err, Error::BoundaryMask(_)));
    }

    #[test]
    fn test_geographic_crs_rejected() {
        let dem = flat(20, 1.0, 1.0).with_crs(CRS::wgs84());
        assert!(matches!(
            relief_stack(&dem, &RadiusSet::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
