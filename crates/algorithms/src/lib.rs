//! # moundscan algorithms
//!
//! Analytical components of the mound detection engine.
//!
//! ## Categories
//!
//! - **statistics**: focal (moving window) statistics with explicit edge handling
//! - **terrain**: multi-scale relief, progressive pattern and circularity scores
//! - **scoring**: weighted combination of the relief scores
//! - **imagery**: radar and optical temporal composites, NDVI
//! - **classification**: training samples and random forest probability
//! - **filter**: probability threshold and neighborhood noise filter
//! - **vector**: label buffers, mask vectorization, candidate attributes

pub mod classification;
pub mod filter;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod scoring;
pub mod statistics;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        ClassifierInput, ForestParams, RandomForest, SampleParams, SupervisedClassifier,
        SupervisedParams, classify_probability, merge_labels, sample_regions, train_classifier,
    };
    pub use crate::filter::{PostFilter, PostFilterParams, post_filter, threshold_mask};
    pub use crate::imagery::{CompositeBuilder, CompositeParams, SceneCollections, build_composite};
    pub use crate::scoring::{ReliefScoring, ReliefScoringParams, ReliefScores, ScoreWeights, score_relief};
    pub use crate::statistics::{EdgePolicy, FocalParams, FocalStatistic, focal_statistics};
    pub use crate::terrain::{RadiusSet, ReliefAnalyzer, relief_stack};
    pub use crate::vector::{
        Connectivity, SizeFilter, VectorizeParams, attach_probability_stats, filter_candidates,
        vectorize,
    };
    pub use moundscan_core::prelude::*;
}
