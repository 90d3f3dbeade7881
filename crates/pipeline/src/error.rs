//! Error types for detection runs

use crate::pipeline::Stage;
use thiserror::Error;

/// Errors surfaced by a detection run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage failed; the run halted there
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: moundscan_core::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("detection task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Stage at which the run halted, if it got that far
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Underlying core error of a stage failure
    pub fn core(&self) -> Option<&moundscan_core::Error> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
