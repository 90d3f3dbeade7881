//! Progressive and magnitude scores from a relief stack
//!
//! - Progressive: 1 when relief strictly increases from each radius to the
//!   next, else 0.
//! - Magnitude: relief at the largest radius rescaled linearly from
//!   [min_relief, max_relief] to [0, 1]; anything outside the band scores 0.
//! - Raw probability: progressive × magnitude.
//!
//! A NaN anywhere in a cell's relief profile makes all three scores NaN.

use crate::maybe_rayon::*;
use crate::terrain::ReliefStack;
use moundscan_core::raster::Raster;
use moundscan_core::{Algorithm, Error, Result};

/// Relief band accepted by the magnitude score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternParams {
    /// Relief mapped to score 0 (inclusive lower bound)
    pub min_relief: f64,
    /// Relief mapped to score 1 (inclusive upper bound)
    pub max_relief: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            min_relief: 0.3,
            max_relief: 3.5,
        }
    }
}

impl PatternParams {
    pub fn validate(&self) -> Result<()> {
        if !self.min_relief.is_finite() || !self.max_relief.is_finite() {
            return Err(Error::invalid_param(
                "relief band",
                format!("[{}, {}]", self.min_relief, self.max_relief),
                "bounds must be finite",
            ));
        }
        if self.max_relief <= self.min_relief {
            return Err(Error::invalid_param(
                "max_relief",
                self.max_relief,
                format!("must exceed min_relief {}", self.min_relief),
            ));
        }
        Ok(())
    }
}

/// Score rasters produced by the pattern scorer
#[derive(Debug, Clone)]
pub struct PatternScores {
    /// 0/1 strictly increasing relief indicator
    pub progressive: Raster<f64>,
    /// Rescaled relief at the largest radius
    pub magnitude: Raster<f64>,
    /// progressive × magnitude
    pub raw: Raster<f64>,
}

/// Pattern scorer
#[derive(Debug, Clone, Default)]
pub struct PatternScorer;

impl Algorithm for PatternScorer {
    type Input = ReliefStack;
    type Output = PatternScores;
    type Params = PatternParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PatternScore"
    }

    fn description(&self) -> &'static str {
        "Progressive relief increase times relief magnitude"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        pattern_scores(&input, params)
    }
}

/// Progressive score for one relief profile (radius order)
pub fn progressive_value(profile: &[f64]) -> f64 {
    if profile.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    if profile.windows(2).all(|w| w[1] > w[0]) {
        1.0
    } else {
        0.0
    }
}

/// Magnitude score for one relief value
pub fn magnitude_value(relief: f64, params: PatternParams) -> f64 {
    if relief.is_nan() {
        return f64::NAN;
    }
    if relief < params.min_relief || relief > params.max_relief {
        return 0.0;
    }
    (relief - params.min_relief) / (params.max_relief - params.min_relief)
}

/// Progressive score raster
pub fn progressive_score(stack: &ReliefStack) -> Result<Raster<f64>> {
    let template = stack.band_at(0);
    let (rows, cols) = template.shape();
    let bands = stack.bands().bands();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut profile = vec![0.0; bands.len()];
            for (col, out) in row_data.iter_mut().enumerate() {
                for (p, band) in profile.iter_mut().zip(bands) {
                    *p = unsafe { band.get_unchecked(row, col) };
                }
                *out = progressive_value(&profile);
            }
            row_data
        })
        .collect();

    template.derive(output_data, Some(f64::NAN))
}

/// Magnitude score raster from a single relief band
pub fn magnitude_score(relief: &Raster<f64>, params: PatternParams) -> Result<Raster<f64>> {
    params.validate()?;
    let mut out = relief.map(|v| magnitude_value(v, params));
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

/// Progressive, magnitude and raw scores
pub fn pattern_scores(stack: &ReliefStack, params: PatternParams) -> Result<PatternScores> {
    params.validate()?;
    let progressive = progressive_score(stack)?;
    let magnitude = magnitude_score(stack.largest(), params)?;
    let mut raw = progressive.zip_map(&magnitude, |p, m| p * m)?;
    raw.set_nodata(Some(f64::NAN));

    Ok(PatternScores {
        progressive,
        magnitude,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progressive_requires_strict_increase() {
        assert_eq!(progressive_value(&[0.1, 0.2, 0.3]), 1.0);
        assert_eq!(progressive_value(&[0.1, 0.2, 0.2]), 0.0);
        assert_eq!(progressive_value(&[0.3, 0.2, 0.4]), 0.0);
        assert_eq!(progressive_value(&[0.0, 0.0]), 0.0);
        assert_eq!(progressive_value(&[0.7]), 1.0);
        assert!(progressive_value(&[0.1, f64::NAN]).is_nan());
    }

    #[test]
    fn test_magnitude_band_edges() {
        let p = PatternParams::default();
        assert_eq!(magnitude_value(0.3, p), 0.0);
        assert_eq!(magnitude_value(3.5, p), 1.0);
        assert!((magnitude_value(1.9, p) - 0.5).abs() < 1e-12);
        assert_eq!(magnitude_value(0.29, p), 0.0);
        assert_eq!(magnitude_value(3.51, p), 0.0);
        assert_eq!(magnitude_value(-2.0, p), 0.0);
        assert!(magnitude_value(f64::NAN, p).is_nan());
    }

    #[test]
    fn test_invalid_band() {
        let p = PatternParams {
            min_relief: 2.0,
            max_relief: 1.0,
        };
        assert!(p.validate().is_err());
        let r: Raster<f64> = Raster::new(2, 2);
        assert!(magnitude_score(&r, p).is_err());
    }
}
