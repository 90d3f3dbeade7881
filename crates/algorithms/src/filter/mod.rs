//! Noise suppression for detection masks

mod post_filter;

pub use post_filter::{PostFilter, PostFilterParams, filter_mask, post_filter, threshold_mask};
