//! Circularity score
//!
//! A radially symmetric mound changes little when smoothed with an isotropic
//! kernel; ridges, edges and single-cell artifacts change more. The score is
//!
//!   diff  = -|gaussian(relief) - relief|
//!   score = clamp((diff - lo) / (hi - lo), 0, 1)
//!
//! with `[lo, hi]` the reference difference range (default [-3, 0] meters).

use crate::maybe_rayon::*;
use crate::terrain::RadiusSet;
use moundscan_core::raster::{Raster, Window};
use moundscan_core::{Algorithm, Error, Result};

/// Parameters for the circularity score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularityParams {
    /// Kernel radius in ground units
    pub radius: f64,
    /// Gaussian standard deviation in ground units
    pub sigma: f64,
    /// Difference range mapped onto [0, 1]
    pub diff_range: [f64; 2],
}

impl Default for CircularityParams {
    fn default() -> Self {
        Self {
            radius: 10.0,
            sigma: 10.0 / 3.0,
            diff_range: [-3.0, 0.0],
        }
    }
}

impl CircularityParams {
    /// Kernel sized to the smallest analysis radius, truncated at 3 sigma
    pub fn for_radii(radii: &RadiusSet) -> Self {
        let radius = radii.smallest();
        Self {
            radius,
            sigma: radius / 3.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sigma > 0.0) || !self.sigma.is_finite() {
            return Err(Error::invalid_param("sigma", self.sigma, "must be positive"));
        }
        let [lo, hi] = self.diff_range;
        if !(hi > lo) || !lo.is_finite() || !hi.is_finite() {
            return Err(Error::invalid_param(
                "diff_range",
                format!("[{}, {}]", lo, hi),
                "upper bound must exceed lower bound",
            ));
        }
        Ok(())
    }
}

/// Normalized isotropic kernel over a disk of cells
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    window: Window,
    offsets: Vec<(isize, isize)>,
    weights: Vec<f64>,
}

impl GaussianKernel {
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// `(row_offset, col_offset, weight)` triples; weights sum to 1
    pub fn taps(&self) -> impl Iterator<Item = (isize, isize, f64)> + '_ {
        self.offsets
            .iter()
            .zip(&self.weights)
            .map(|(&(dr, dc), &w)| (dr, dc, w))
    }
}

/// Build a gaussian kernel of ground `radius` and `sigma` for a grid of `cell_size`
pub fn gaussian_kernel(radius: f64, sigma: f64, cell_size: f64) -> Result<GaussianKernel> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return Err(Error::invalid_param("sigma", sigma, "must be positive"));
    }
    let window = Window::circle_ground(radius, cell_size)?;
    let offsets = window.offsets();
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut weights: Vec<f64> = offsets
        .iter()
        .map(|&(dr, dc)| {
            let d2 = ((dr * dr + dc * dc) as f64) * cell_size * cell_size;
            (-d2 / two_sigma_sq).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= total;
    }

    Ok(GaussianKernel {
        window,
        offsets,
        weights,
    })
}

/// Convolve with a kernel; cells whose kernel footprint is incomplete are NaN
pub fn gaussian_smooth(raster: &Raster<f64>, kernel: &GaussianKernel) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                if !kernel.window.fits(row, col, rows, cols) {
                    continue;
                }
                let mut sum = 0.0;
                for (dr, dc, w) in kernel.taps() {
                    let v = unsafe {
                        raster.get_unchecked((row as isize + dr) as usize, (col as isize + dc) as usize)
                    };
                    sum += v * w;
                }
                // NaN anywhere in the footprint propagates
                *out = sum;
            }
            row_data
        })
        .collect();

    raster.derive(output_data, Some(f64::NAN))
}

/// Circularity scorer
#[derive(Debug, Clone, Default)]
pub struct CircularityScorer;

impl Algorithm for CircularityScorer {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = CircularityParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Circularity"
    }

    fn description(&self) -> &'static str {
        "Penalizes deviation of relief from its gaussian-smoothed self"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        circularity_score(&input, params)
    }
}

/// Score a difference value against the reference range
pub fn circularity_value(smoothed: f64, relief: f64, diff_range: [f64; 2]) -> f64 {
    let diff = -(smoothed - relief).abs();
    let [lo, hi] = diff_range;
    ((diff - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Circularity score of the relief at the largest analysis radius
///
/// # Errors
/// * `BoundaryMask` if no cell has a complete kernel footprint
pub fn circularity_score(relief: &Raster<f64>, params: CircularityParams) -> Result<Raster<f64>> {
    params.validate()?;
    let kernel = gaussian_kernel(params.radius, params.sigma, relief.cell_size())?;
    let smoothed = gaussian_smooth(relief, &kernel)?;

    let mut score = smoothed.zip_map(relief, |s, r| {
        if s.is_nan() || r.is_nan() {
            f64::NAN
        } else {
            circularity_value(s, r, params.diff_range)
        }
    })?;
    score.set_nodata(Some(f64::NAN));

    if score.data().iter().all(|v| v.is_nan()) {
        return Err(Error::BoundaryMask(
            "circularity kernel leaves no valid relief cell".into(),
        ));
    }
    Ok(score)
}
