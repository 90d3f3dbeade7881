//! Background execution of a detection run on the tokio blocking pool

use crate::error::{PipelineError, Result};
use crate::pipeline::{DetectionPipeline, DetectionResult};
use moundscan_core::CancelToken;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a detection run executing in the background
#[derive(Debug)]
pub struct DetectionHandle {
    cancel: CancelToken,
    task: JoinHandle<Result<DetectionResult>>,
}

impl DetectionHandle {
    /// Ask the run to stop at its next checkpoint; the run then fails with
    /// a `Cancelled` cause at the stage it was in
    pub fn cancel(&self) {
        info!("cancellation requested");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to finish
    pub async fn join(self) -> Result<DetectionResult> {
        self.task
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))?
    }
}

/// Start `pipeline` on the blocking pool of the current tokio runtime
pub fn spawn_detection(pipeline: DetectionPipeline) -> DetectionHandle {
    spawn_detection_with(pipeline, CancelToken::new())
}

/// Start `pipeline` observing an existing cancellation token
pub fn spawn_detection_with(mut pipeline: DetectionPipeline, cancel: CancelToken) -> DetectionHandle {
    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || pipeline.run(&token));
    DetectionHandle { cancel, task }
}
