//! # moundscan pipeline
//!
//! Orchestration of one mound detection run:
//!
//! - [`DetectionConfig`]: immutable run configuration loaded from TOML
//! - [`RasterSource`]: elevation, radar/optical scenes and training labels
//! - [`ExportSink`]: destination of the probability raster, the filtered
//!   mask and the candidate polygons
//! - [`DetectionPipeline`]: linear state machine running one strategy
//! - [`spawn_detection`]: background execution with cancellation

pub mod config;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod sink;
pub mod source;

pub use config::{DetectionConfig, Strategy};
pub use error::{PipelineError, Result};
pub use pipeline::{DetectionPipeline, DetectionResult, PipelineState, Stage};
pub use runner::{DetectionHandle, spawn_detection, spawn_detection_with};
pub use sink::{Artifact, DirectorySink, ExportRecord, ExportSink, MemorySink};
pub use source::{LabelSets, ManifestSource, MemorySource, RasterSource};
