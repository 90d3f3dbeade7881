//! Threshold and neighborhood noise filter for probability surfaces

use crate::statistics::{EdgePolicy, FocalParams, FocalStatistic, WindowShape, focal_statistics};
use moundscan_core::raster::Raster;
use moundscan_core::{Algorithm, Error, Result};

/// Parameters for [`PostFilter`]
#[derive(Debug, Clone)]
pub struct PostFilterParams {
    /// Pixels with probability strictly above this are kept
    pub threshold: f64,
    /// Filter radius in pixels
    pub radius: usize,
    pub shape: WindowShape,
    /// `Median` or `Majority`
    pub statistic: FocalStatistic,
}

impl Default for PostFilterParams {
    fn default() -> Self {
        Self {
            threshold: 0.55,
            radius: 1,
            shape: WindowShape::Square,
            statistic: FocalStatistic::Median,
        }
    }
}

impl PostFilterParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::invalid_param("threshold", self.threshold, "must lie in (0, 1)"));
        }
        if self.radius == 0 {
            return Err(Error::invalid_param("radius", self.radius, "must be at least 1 pixel"));
        }
        if !matches!(self.statistic, FocalStatistic::Median | FocalStatistic::Majority) {
            return Err(Error::invalid_param(
                "statistic",
                format!("{:?}", self.statistic),
                "post filter supports Median or Majority",
            ));
        }
        Ok(())
    }
}

/// Binary mask of `prob > threshold`; NaN maps to 0
pub fn threshold_mask(prob: &Raster<f64>, threshold: f64) -> Raster<u8> {
    prob.map(|v| u8::from(v > threshold))
}

/// Neighborhood filter of a binary mask, re-binarized to `result > 0`.
///
/// Windows are truncated at the raster edge so border pixels are judged by
/// the neighbors they have.
pub fn filter_mask(mask: &Raster<u8>, params: &PostFilterParams) -> Result<Raster<u8>> {
    let values = mask.map(f64::from);
    let filtered = focal_statistics(
        &values,
        FocalParams {
            radius: params.radius,
            statistic: params.statistic,
            shape: params.shape,
            edge: EdgePolicy::Truncate,
        },
    )?;
    Ok(filtered.map(|v| u8::from(v > 0.0)))
}

/// Threshold a probability raster and suppress isolated detections
pub fn post_filter(prob: &Raster<f64>, params: &PostFilterParams) -> Result<Raster<u8>> {
    params.validate()?;
    filter_mask(&threshold_mask(prob, params.threshold), params)
}

/// Post-filter algorithm
#[derive(Debug, Clone, Default)]
pub struct PostFilter;

impl Algorithm for PostFilter {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = PostFilterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PostFilter"
    }

    fn description(&self) -> &'static str {
        "Probability threshold followed by a median or majority neighborhood filter"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        post_filter(&input, &params)
    }
}
