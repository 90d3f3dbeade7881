//! Vector operations on labels and candidates
//!
//! - Buffer: widen point labels before sampling
//! - Vectorize: binary mask to one polygon per connected component
//! - Candidates: per-polygon probability statistics and size filtering

mod buffer;
mod candidates;
mod vectorize;

pub use buffer::{BufferParams, buffer_labels, buffer_point};
pub use candidates::{SizeFilter, attach_probability_stats, equivalent_diameter, filter_candidates};
pub use vectorize::{
    Components, Connectivity, VectorizeParams, Vectorized, label_components, vectorize,
};
