//! Terrain-relief mound scoring
//!
//! Algorithms for scoring mound-like features on a Digital Elevation Model:
//! - Relief: elevation minus circular neighborhood mean at several radii
//! - Pattern: progressive relief increase and relief magnitude
//! - Circularity: agreement of relief with its gaussian-smoothed self

mod circularity;
mod pattern;
mod relief;

pub use circularity::{
    CircularityParams, CircularityScorer, GaussianKernel, circularity_score, circularity_value,
    gaussian_kernel, gaussian_smooth,
};
pub use pattern::{
    PatternParams, PatternScorer, PatternScores, magnitude_score, magnitude_value,
    pattern_scores, progressive_score, progressive_value,
};
pub use relief::{RadiusSet, ReliefAnalyzer, ReliefStack, relief_stack};
