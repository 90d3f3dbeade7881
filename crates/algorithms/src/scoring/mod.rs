//! Relief-path scoring: pattern and circularity combined into one surface

mod combine;

pub use combine::{ScoreWeights, combine_scores};

use crate::terrain::{
    CircularityParams, PatternParams, PatternScores, RadiusSet, ReliefStack, circularity_score,
    pattern_scores, relief_stack,
};
use moundscan_core::raster::Raster;
use moundscan_core::{Algorithm, Error, Result};

/// Parameters for the full relief scoring chain
#[derive(Debug, Clone)]
pub struct ReliefScoringParams {
    pub radii: RadiusSet,
    pub pattern: PatternParams,
    pub circularity: CircularityParams,
    pub weights: ScoreWeights,
}

impl Default for ReliefScoringParams {
    fn default() -> Self {
        let radii = RadiusSet::default();
        Self {
            circularity: CircularityParams::for_radii(&radii),
            radii,
            pattern: PatternParams::default(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Every intermediate of the relief path
#[derive(Debug, Clone)]
pub struct ReliefScores {
    pub relief: ReliefStack,
    pub pattern: PatternScores,
    pub circularity: Raster<f64>,
    /// Final probability surface
    pub combined: Raster<f64>,
}

/// Relief → pattern + circularity → combined
#[derive(Debug, Clone, Default)]
pub struct ReliefScoring;

impl Algorithm for ReliefScoring {
    type Input = Raster<f64>;
    type Output = ReliefScores;
    type Params = ReliefScoringParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ReliefScoring"
    }

    fn description(&self) -> &'static str {
        "Multi-scale relief pattern and circularity combined into a mound probability"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        score_relief(&input, &params)
    }
}

/// Run the relief scoring chain on a DEM
pub fn score_relief(dem: &Raster<f64>, params: &ReliefScoringParams) -> Result<ReliefScores> {
    let relief = relief_stack(dem, &params.radii)?;
    let pattern = pattern_scores(&relief, params.pattern)?;
    let circularity = circularity_score(relief.largest(), params.circularity)?;
    let combined = combine_scores(&pattern.raw, &circularity, params.weights)?;

    Ok(ReliefScores {
        relief,
        pattern,
        circularity,
        combined,
    })
}
