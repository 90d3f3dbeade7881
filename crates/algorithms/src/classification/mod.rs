//! Supervised site classification
//!
//! - **training**: label merging, class forcing and composite sampling
//! - **forest**: random forest with probability output
//! - **supervised**: training plus pixel-wise application to a composite

mod forest;
mod supervised;
mod training;

pub use forest::{ForestParams, POSITIVE_CLASS, RandomForest};
pub use supervised::{
    ClassifierInput, SupervisedClassifier, SupervisedParams, classify_probability, train_classifier,
};
pub use training::{
    CLASS_PROPERTY, SampleParams, TrainingSample, TrainingSet, force_class, merge_labels, sample_regions,
};
