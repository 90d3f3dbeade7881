//! Detection pipeline state machine
//!
//! ```text
//! Configured → SourceLoaded → (ReliefScored | Classified) → PostFiltered → Vectorized → Exported
//! ```
//!
//! One strategy runs per invocation. Any stage error halts the run in
//! [`PipelineState::Failed`] and is returned with the stage attached; nothing
//! is retried.

use crate::config::{DetectionConfig, Strategy};
use crate::error::{PipelineError, Result};
use crate::sink::{Artifact, ExportRecord, ExportSink};
use crate::source::{LabelSets, RasterSource};
use moundscan_algorithms::classification::{ClassifierInput, SupervisedClassifier};
use moundscan_algorithms::filter::post_filter;
use moundscan_algorithms::imagery::{OpticalMask, RADAR_POLARISATIONS, SceneCollections, build_composite};
use moundscan_algorithms::scoring::score_relief;
use moundscan_algorithms::vector::{attach_probability_stats, filter_candidates, vectorize};
use moundscan_core::raster::Raster;
use moundscan_core::vector::FeatureCollection;
use moundscan_core::{Algorithm, CancelToken, Region};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

/// Pipeline stage; a stage is reached once its work has succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Configured,
    SourceLoaded,
    ReliefScored,
    Classified,
    PostFiltered,
    Vectorized,
    Exported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configured => "configured",
            Stage::SourceLoaded => "source_loaded",
            Stage::ReliefScored => "relief_scored",
            Stage::Classified => "classified",
            Stage::PostFiltered => "post_filtered",
            Stage::Vectorized => "vectorized",
            Stage::Exported => "exported",
        };
        f.write_str(name)
    }
}

/// Current position of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    At(Stage),
    /// `stage` is the stage whose work failed
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::At(Stage::Exported) | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::At(stage) => write!(f, "{}", stage),
            PipelineState::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
        }
    }
}

/// Outputs of a successful run
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub run_id: String,
    pub strategy: Strategy,
    /// Per-pixel site probability (relief combined score or classifier output)
    pub probability: Raster<f64>,
    /// Post-filtered binary mask
    pub mask: Raster<u8>,
    /// Candidate polygons with probability attributes
    pub candidates: FeatureCollection,
    pub exports: Vec<ExportRecord>,
    pub history: Vec<PipelineState>,
}

enum Inputs {
    Elevation(Raster<f64>),
    Imagery {
        scenes: SceneCollections,
        labels: LabelSets,
        template: Raster<f64>,
    },
}

/// Linear detection run over one region
pub struct DetectionPipeline {
    config: DetectionConfig,
    region: Region,
    source: Arc<dyn RasterSource>,
    sink: Box<dyn ExportSink>,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("run_id", &self.config.run_id)
            .field("strategy", &self.config.strategy)
            .field("state", &self.state)
            .finish()
    }
}

impl DetectionPipeline {
    /// Validate `config` and build a pipeline in the `Configured` state
    pub fn new(
        config: DetectionConfig,
        source: Arc<dyn RasterSource>,
        sink: Box<dyn ExportSink>,
    ) -> Result<Self> {
        config.validate()?;
        let region = config.region()?;
        let state = PipelineState::At(Stage::Configured);
        Ok(Self {
            config,
            region,
            source,
            sink,
            history: vec![state.clone()],
            state,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every state visited, oldest first
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run every stage once.
    ///
    /// # Errors
    /// * `PipelineError::Stage` naming the failing stage and its cause
    /// * `PipelineError::Config` if the pipeline has already run
    pub fn run(&mut self, cancel: &CancelToken) -> Result<DetectionResult> {
        if self.state != PipelineState::At(Stage::Configured) {
            return Err(PipelineError::Config(format!(
                "pipeline is {}; build a new one to run again",
                self.state
            )));
        }
        let span = info_span!("detection", run_id = %self.config.run_id);
        let _guard = span.enter();
        info!(strategy = %self.config.strategy, "starting detection run");

        let inputs = self.load_inputs(cancel);
        let inputs = self.advance(Stage::SourceLoaded, inputs)?;

        let probability = match inputs {
            Inputs::Elevation(dem) => {
                let scored = self.score(&dem, cancel);
                self.advance(Stage::ReliefScored, scored)?
            }
            Inputs::Imagery {
                scenes,
                labels,
                template,
            } => {
                let classified = self.classify(scenes, labels, &template, cancel);
                self.advance(Stage::Classified, classified)?
            }
        };

        let mask = self.filter(&probability, cancel);
        let mask = self.advance(Stage::PostFiltered, mask)?;

        let candidates = self.vectorize(&mask, &probability, cancel);
        let candidates = self.advance(Stage::Vectorized, candidates)?;

        let exports = self.export(&probability, &mask, &candidates, cancel);
        let exports = self.advance(Stage::Exported, exports)?;

        info!(candidates = candidates.len(), "detection run complete");
        Ok(DetectionResult {
            run_id: self.config.run_id.clone(),
            strategy: self.config.strategy,
            probability,
            mask,
            candidates,
            exports,
            history: self.history.clone(),
        })
    }

    fn advance<T>(&mut self, stage: Stage, result: moundscan_core::Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                debug!(%stage, "stage reached");
                self.set_state(PipelineState::At(stage));
                Ok(value)
            }
            Err(source) => {
                error!(%stage, error = %source, "stage failed");
                self.set_state(PipelineState::Failed {
                    stage,
                    reason: source.to_string(),
                });
                Err(PipelineError::Stage { stage, source })
            }
        }
    }

    fn set_state(&mut self, state: PipelineState) {
        self.history.push(state.clone());
        self.state = state;
    }

    fn load_inputs(&self, cancel: &CancelToken) -> moundscan_core::Result<Inputs> {
        cancel.check()?;
        match self.config.strategy {
            Strategy::Relief => {
                let dem = self.region.clip(&self.source.elevation(&self.region)?)?;
                info!(rows = dem.rows(), cols = dem.cols(), cell = dem.cell_size(), "elevation loaded");
                Ok(Inputs::Elevation(dem))
            }
            Strategy::Composite => {
                let composite = &self.config.composite;
                let radar_dates = composite.radar_dates().map_err(config_to_core)?;
                let optical_dates = composite.optical_dates().map_err(config_to_core)?;
                let radar_bands = RADAR_POLARISATIONS.map(|p| p.band_name());
                let radar = self.source.fetch(&radar_bands, &self.region, &radar_dates)?.radar;

                let mask = OpticalMask::from(composite.optical_mask);
                let optical_bands: Vec<&str> = composite
                    .optical_bands
                    .iter()
                    .map(String::as_str)
                    .chain([mask.band_name()])
                    .collect();
                let optical = self.source.fetch(&optical_bands, &self.region, &optical_dates)?.optical;
                let labels = self.source.labels()?;
                info!(
                    radar = radar.len(),
                    optical = optical.len(),
                    positives = labels.positives.len(),
                    others = labels.others.len(),
                    "scenes and labels loaded"
                );

                let crs = self.config.crs().or_else(|| {
                    radar
                        .iter()
                        .find_map(|s| s.bands.template().ok().and_then(|b| b.crs().cloned()))
                });
                let template = self.region.grid(self.config.classifier.sample_scale_m, crs)?;
                Ok(Inputs::Imagery {
                    scenes: SceneCollections { radar, optical },
                    labels,
                    template,
                })
            }
        }
    }

    fn score(&self, dem: &Raster<f64>, cancel: &CancelToken) -> moundscan_core::Result<Raster<f64>> {
        cancel.check()?;
        let params = self.config.relief.to_params()?;
        let scores = score_relief(dem, &params)?;
        debug!(
            radii = ?params.radii.radii(),
            kernel_radius = params.circularity.radius,
            "relief scored"
        );
        Ok(scores.combined)
    }

    fn classify(
        &self,
        scenes: SceneCollections,
        labels: LabelSets,
        template: &Raster<f64>,
        cancel: &CancelToken,
    ) -> moundscan_core::Result<Raster<f64>> {
        cancel.check()?;
        let composite = build_composite(&scenes, template, &self.config.composite.to_params()?)?;
        debug!(bands = ?composite.names(), "composite built");

        let input = ClassifierInput {
            composite,
            positives: labels.positives,
            others: labels.others,
        };
        SupervisedClassifier::with_cancel(cancel.clone()).execute(input, self.config.classifier.to_params())
    }

    fn filter(&self, probability: &Raster<f64>, cancel: &CancelToken) -> moundscan_core::Result<Raster<u8>> {
        cancel.check()?;
        let params = self.config.post_filter_params();
        let mask = post_filter(probability, &params)?;
        debug!(
            threshold = params.threshold,
            kept = mask.data().iter().filter(|&&v| v == 1).count(),
            "mask filtered"
        );
        Ok(mask)
    }

    fn vectorize(
        &self,
        mask: &Raster<u8>,
        probability: &Raster<f64>,
        cancel: &CancelToken,
    ) -> moundscan_core::Result<FeatureCollection> {
        let vectorized = vectorize(mask, &self.config.vectorize.to_params(), cancel)?;
        let candidates = attach_probability_stats(&vectorized, probability, &self.config.run_id)?;

        match self.config.vectorize.size_filter()? {
            Some(filter) => {
                let kept = filter_candidates(&candidates, &filter);
                if kept.len() < candidates.len() {
                    warn!(
                        dropped = candidates.len() - kept.len(),
                        "candidates outside the site size range dropped"
                    );
                }
                Ok(kept)
            }
            None => Ok(candidates),
        }
    }

    fn export(
        &mut self,
        probability: &Raster<f64>,
        mask: &Raster<u8>,
        candidates: &FeatureCollection,
        cancel: &CancelToken,
    ) -> moundscan_core::Result<Vec<ExportRecord>> {
        cancel.check()?;
        let run_id = &self.config.run_id;
        let resolution = self.config.export.resolution_m.unwrap_or_else(|| probability.cell_size());
        let artifacts = [
            (format!("{}_probability", run_id), Artifact::Raster(probability.clone())),
            (format!("{}_filtered", run_id), Artifact::Raster(mask.map(f64::from))),
            (format!("{}_candidates", run_id), Artifact::Vector(candidates.clone())),
        ];

        let mut records = Vec::with_capacity(artifacts.len());
        for (name, artifact) in &artifacts {
            records.push(self.sink.write(artifact, name, &self.region, resolution)?);
        }
        Ok(records)
    }
}

fn config_to_core(e: PipelineError) -> moundscan_core::Error {
    moundscan_core::Error::Other(e.to_string())
}
