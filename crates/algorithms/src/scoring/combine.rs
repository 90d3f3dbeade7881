//! Weighted combination of pattern and circularity scores

use moundscan_core::raster::Raster;
use moundscan_core::{Error, Result};

/// Weights of the combined probability surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pattern: f64,
    circularity: f64,
}

impl ScoreWeights {
    /// Non-negative weights summing to at most 1, so inputs in [0, 1] combine into [0, 1]
    pub fn new(pattern: f64, circularity: f64) -> Result<Self> {
        for (name, w) in [("pattern", pattern), ("circularity", circularity)] {
            if !(w >= 0.0) || !w.is_finite() {
                return Err(Error::invalid_param(name, w, "weight must be non-negative"));
            }
        }
        if pattern + circularity > 1.0 + 1e-9 {
            return Err(Error::invalid_param(
                "weights",
                format!("{} + {}", pattern, circularity),
                "weights must sum to at most 1",
            ));
        }
        Ok(Self {
            pattern,
            circularity,
        })
    }

    pub fn pattern(&self) -> f64 {
        self.pattern
    }

    pub fn circularity(&self) -> f64 {
        self.circularity
    }

    pub fn combine(&self, raw: f64, circularity: f64) -> f64 {
        self.pattern * raw + self.circularity * circularity
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            pattern: 0.6,
            circularity: 0.4,
        }
    }
}

/// combined = w_pattern × raw + w_circularity × circularity
pub fn combine_scores(
    raw: &Raster<f64>,
    circularity: &Raster<f64>,
    weights: ScoreWeights,
) -> Result<Raster<f64>> {
    let mut combined = raw.zip_map(circularity, |r, c| weights.combine(r, c))?;
    combined.set_nodata(Some(f64::NAN));
    Ok(combined)
}
