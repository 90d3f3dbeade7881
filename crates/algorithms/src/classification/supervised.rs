//! Supervised probability classification of a composite
//!
//! Labels are merged, buffered and sampled from the composite, a random
//! forest is trained on the samples and then applied to every pixel.

use crate::maybe_rayon::*;
use crate::vector::{BufferParams, buffer_labels};
use moundscan_core::raster::{BandStack, Raster};
use moundscan_core::vector::FeatureCollection;
use moundscan_core::{Algorithm, CancelToken, Error, Result};

use super::forest::{ForestParams, RandomForest};
use super::training::{SampleParams, merge_labels, sample_regions};

/// Parameters for [`SupervisedClassifier`]
#[derive(Debug, Clone, Default)]
pub struct SupervisedParams {
    /// Bands fed to the forest, in order; all composite bands when empty
    pub bands: Vec<String>,
    pub sample: SampleParams,
    /// Buffer applied to point labels before sampling
    pub label_buffer: Option<BufferParams>,
    pub forest: ForestParams,
}

/// Labeled input for one classification
#[derive(Debug, Clone)]
pub struct ClassifierInput {
    pub composite: BandStack,
    /// Known sites (class attribute kept)
    pub positives: FeatureCollection,
    /// Everything else (forced to class 0)
    pub others: FeatureCollection,
}

/// Random forest probability classifier
#[derive(Debug, Clone, Default)]
pub struct SupervisedClassifier {
    cancel: CancelToken,
}

impl SupervisedClassifier {
    /// Classifier that aborts training and inference when `cancel` fires
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl Algorithm for SupervisedClassifier {
    type Input = ClassifierInput;
    type Output = Raster<f64>;
    type Params = SupervisedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SupervisedClassifier"
    }

    fn description(&self) -> &'static str {
        "Random forest site probability from labeled composite samples"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let composite = select_bands(&input.composite, &params.bands)?;
        let model = train_classifier(&composite, &input.positives, &input.others, &params, &self.cancel)?;
        classify_probability(&composite, &model, &self.cancel)
    }
}

fn select_bands(composite: &BandStack, bands: &[String]) -> Result<BandStack> {
    if bands.is_empty() {
        Ok(composite.clone())
    } else {
        composite.select(bands)
    }
}

/// Merge the label sets, sample the composite and grow the forest
pub fn train_classifier(
    composite: &BandStack,
    positives: &FeatureCollection,
    others: &FeatureCollection,
    params: &SupervisedParams,
    cancel: &CancelToken,
) -> Result<RandomForest> {
    let composite = select_bands(composite, &params.bands)?;
    let mut labels = merge_labels(positives, others);
    if let Some(buffer) = &params.label_buffer {
        labels = buffer_labels(&labels, buffer)?;
    }
    let samples = sample_regions(&composite, &labels, &params.sample)?;
    RandomForest::train(&samples, &params.forest, cancel)
}

/// Apply `model` to every pixel of `composite`.
///
/// Bands are read in the order the model was trained on. Pixels with any
/// missing band value are NaN in the output; the rest lie in [0, 1].
pub fn classify_probability(composite: &BandStack, model: &RandomForest, cancel: &CancelToken) -> Result<Raster<f64>> {
    let stack = composite.select(model.bands())?;
    let template = stack.template()?;
    let (rows, cols) = template.shape();
    let bands = stack.bands();

    let row_blocks = (0..rows)
        .into_par_iter()
        .map(|row| {
            cancel.check()?;
            let mut row_data = vec![f64::NAN; cols];
            let mut values = vec![0.0; bands.len()];
            for (col, out) in row_data.iter_mut().enumerate() {
                for (v, band) in values.iter_mut().zip(bands) {
                    *v = unsafe { band.get_unchecked(row, col) };
                }
                if values.iter().all(|v| v.is_finite()) {
                    *out = model.predict_proba(&values)?;
                }
            }
            Ok(row_data)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    template.derive(row_blocks.concat(), Some(f64::NAN))
}
