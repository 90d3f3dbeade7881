//! Run configuration loaded from TOML
//!
//! A [`DetectionConfig`] is read once, validated, and handed by reference to
//! the pipeline. Every section has defaults, so a file only needs the keys it
//! changes plus a region.
//!
//! ```toml
//! run_id = "it1"
//! strategy = "composite"
//!
//! [region]
//! epsg = 32618
//! center = [500000.0, 4000000.0]
//! radius_m = 2000.0
//!
//! [composite]
//! radar_dates = { start = "2021-01-01", end = "2021-12-31" }
//! optical_dates = { start = "2021-06-01", end = "2021-09-30" }
//! ```

use crate::error::{PipelineError, Result};
use moundscan_algorithms::classification::{ForestParams, SampleParams, SupervisedParams};
use moundscan_algorithms::filter::PostFilterParams;
use moundscan_algorithms::imagery::{CompositeParams, OPTICAL_BANDS, OpticalMask, OpticalParams, RadarParams};
use moundscan_algorithms::scoring::{ReliefScoringParams, ScoreWeights};
use moundscan_algorithms::statistics::{FocalStatistic, WindowShape};
use moundscan_algorithms::terrain::{CircularityParams, PatternParams, RadiusSet};
use moundscan_algorithms::vector::{BufferParams, Connectivity, SizeFilter, VectorizeParams};
use moundscan_core::scene::DateRange;
use moundscan_core::{CRS, Region};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Detection strategy run by one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Terrain relief scoring on the elevation model
    #[default]
    Relief,
    /// Radar/optical composite and random forest classification
    Composite,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Relief => write!(f, "relief"),
            Strategy::Composite => write!(f, "composite"),
        }
    }
}

/// Complete configuration of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Prefix of every exported artifact name
    pub run_id: String,
    pub strategy: Strategy,
    /// Display center; not used by any computation
    pub map_center: Option<[f64; 2]>,
    pub region: Option<RegionConfig>,
    pub relief: ReliefConfig,
    pub composite: CompositeConfig,
    pub classifier: ClassifierConfig,
    pub post_filter: PostFilterConfig,
    pub vectorize: VectorizeConfig,
    pub export: ExportConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            run_id: "run".to_string(),
            strategy: Strategy::Relief,
            map_center: None,
            region: None,
            relief: ReliefConfig::default(),
            composite: CompositeConfig::default(),
            classifier: ClassifierConfig::default(),
            post_filter: PostFilterConfig::default(),
            vectorize: VectorizeConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl DetectionConfig {
    /// Read and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Check every option the selected strategy will use
    pub fn validate(&self) -> Result<()> {
        if self.run_id.trim().is_empty() {
            return Err(config_err("run_id must not be empty"));
        }
        if self.run_id.contains(&['/', '\\'][..]) {
            return Err(config_err("run_id must not contain path separators"));
        }
        self.region()?;

        match self.strategy {
            Strategy::Relief => {
                self.relief.to_params().map_err(config_err)?;
                if !(self.relief.candidate_cutoff > 0.0 && self.relief.candidate_cutoff < 1.0) {
                    return Err(config_err(format!(
                        "relief.candidate_cutoff = {} must lie in (0, 1)",
                        self.relief.candidate_cutoff
                    )));
                }
            }
            Strategy::Composite => {
                self.composite.radar_dates()?;
                self.composite.optical_dates()?;
                self.composite.to_params().map_err(config_err)?;
                self.classifier.to_params().forest.validate().map_err(config_err)?;
                if !(self.classifier.sample_scale_m > 0.0) {
                    return Err(config_err("classifier.sample_scale_m must be positive"));
                }
                if let Some(d) = self.classifier.label_buffer_m
                    && !(d > 0.0)
                {
                    return Err(config_err("classifier.label_buffer_m must be positive"));
                }
            }
        }
        self.post_filter_params().validate().map_err(config_err)?;

        self.vectorize.size_filter().map_err(config_err)?;
        if let Some(r) = self.export.resolution_m
            && !(r > 0.0 && r.is_finite())
        {
            return Err(config_err("export.resolution_m must be positive"));
        }
        Ok(())
    }

    /// Post-filter options of the selected strategy; the relief path
    /// thresholds at `relief.candidate_cutoff`
    pub fn post_filter_params(&self) -> PostFilterParams {
        let mut params = self.post_filter.to_params();
        if self.strategy == Strategy::Relief {
            params.threshold = self.relief.candidate_cutoff;
        }
        params
    }

    /// Analysis region built from the `[region]` section
    pub fn region(&self) -> Result<Region> {
        self.region
            .as_ref()
            .ok_or_else(|| config_err("a [region] section is required"))?
            .to_region()
    }

    /// CRS declared for the region, if any
    pub fn crs(&self) -> Option<CRS> {
        self.region.as_ref().and_then(|r| r.epsg).map(CRS::from_epsg)
    }
}

fn config_err(msg: impl ToString) -> PipelineError {
    PipelineError::Config(msg.to_string())
}

/// Region geometry: either a polygon ring or a buffered center point
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub epsg: Option<u32>,
    pub ring: Option<Vec<[f64; 2]>>,
    pub center: Option<[f64; 2]>,
    pub radius_m: Option<f64>,
}

impl RegionConfig {
    pub fn to_region(&self) -> Result<Region> {
        let region = match (&self.ring, self.center, self.radius_m) {
            (Some(ring), None, None) => Region::polygon(ring.iter().map(|[x, y]| (*x, *y)).collect()),
            (None, Some([x, y]), Some(radius)) => Region::buffer((x, y), radius),
            _ => {
                return Err(config_err(
                    "region needs either `ring` or both `center` and `radius_m`",
                ));
            }
        };
        region.map_err(config_err)
    }
}

/// Relief-path options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    pub radii_m: Vec<f64>,
    pub min_relief: f64,
    pub max_relief: f64,
    /// Combined score above which a pixel becomes a candidate
    pub candidate_cutoff: f64,
    pub circularity: CircularityConfig,
    pub weights: WeightsConfig,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        let pattern = PatternParams::default();
        Self {
            radii_m: RadiusSet::default().radii().to_vec(),
            min_relief: pattern.min_relief,
            max_relief: pattern.max_relief,
            candidate_cutoff: 0.6,
            circularity: CircularityConfig::default(),
            weights: WeightsConfig::default(),
        }
    }
}

impl ReliefConfig {
    pub fn to_params(&self) -> moundscan_core::Result<ReliefScoringParams> {
        let radii = RadiusSet::new(self.radii_m.clone())?;
        let pattern = PatternParams {
            min_relief: self.min_relief,
            max_relief: self.max_relief,
        };
        pattern.validate()?;

        let mut circularity = CircularityParams::for_radii(&radii);
        if let Some(radius) = self.circularity.radius_m {
            circularity.radius = radius;
            circularity.sigma = radius / 3.0;
        }
        if let Some(sigma) = self.circularity.sigma_m {
            circularity.sigma = sigma;
        }
        circularity.diff_range = self.circularity.diff_range;
        circularity.validate()?;

        Ok(ReliefScoringParams {
            radii,
            pattern,
            circularity,
            weights: ScoreWeights::new(self.weights.pattern, self.weights.circularity)?,
        })
    }
}

/// Circularity kernel; radius defaults to the smallest analysis radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircularityConfig {
    pub radius_m: Option<f64>,
    pub sigma_m: Option<f64>,
    pub diff_range: [f64; 2],
}

impl Default for CircularityConfig {
    fn default() -> Self {
        Self {
            radius_m: None,
            sigma_m: None,
            diff_range: CircularityParams::default().diff_range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub pattern: f64,
    pub circularity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let w = ScoreWeights::default();
        Self {
            pattern: w.pattern(),
            circularity: w.circularity(),
        }
    }
}

/// Optical quality mask selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    #[default]
    Qa60,
    Scl,
}

impl From<MaskKind> for OpticalMask {
    fn from(kind: MaskKind) -> Self {
        match kind {
            MaskKind::Qa60 => OpticalMask::Qa60,
            MaskKind::Scl => OpticalMask::Scl,
        }
    }
}

/// Largest rounding precision a composite accepts
const MAX_DECIMALS: u32 = 12;

/// Composite-path imagery options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub radar_dates: Option<DateRange>,
    pub optical_dates: Option<DateRange>,
    pub cloud_filter_pct: f64,
    pub instrument_mode: String,
    pub optical_mask: MaskKind,
    pub optical_bands: Vec<String>,
    pub decimals: u32,
    pub append_ndvi: bool,
    pub radar_noise_floor_db: Option<f64>,
    pub speckle_radius_m: Option<f64>,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            radar_dates: None,
            optical_dates: None,
            cloud_filter_pct: 20.0,
            instrument_mode: "IW".to_string(),
            optical_mask: MaskKind::Qa60,
            optical_bands: OPTICAL_BANDS.iter().map(|b| b.to_string()).collect(),
            decimals: 4,
            append_ndvi: false,
            radar_noise_floor_db: None,
            speckle_radius_m: None,
        }
    }
}

impl CompositeConfig {
    pub fn radar_dates(&self) -> Result<DateRange> {
        checked_range(self.radar_dates, "composite.radar_dates")
    }

    pub fn optical_dates(&self) -> Result<DateRange> {
        checked_range(self.optical_dates, "composite.optical_dates")
    }

    pub fn to_params(&self) -> moundscan_core::Result<CompositeParams> {
        if self.decimals > MAX_DECIMALS {
            return Err(moundscan_core::Error::invalid_param(
                "decimals",
                self.decimals,
                format!("at most {}", MAX_DECIMALS),
            ));
        }
        if !(self.cloud_filter_pct > 0.0 && self.cloud_filter_pct <= 100.0) {
            return Err(moundscan_core::Error::invalid_param(
                "cloud_filter_pct",
                self.cloud_filter_pct,
                "must lie in (0, 100]",
            ));
        }
        if let Some(r) = self.speckle_radius_m
            && !(r > 0.0)
        {
            return Err(moundscan_core::Error::invalid_param("speckle_radius_m", r, "must be positive"));
        }
        if self.append_ndvi && !(self.has_band("B4") && self.has_band("B8")) {
            return Err(moundscan_core::Error::invalid_param(
                "append_ndvi",
                true,
                "optical_bands must include B4 and B8",
            ));
        }
        Ok(CompositeParams {
            radar: RadarParams {
                instrument_mode: self.instrument_mode.clone(),
                noise_floor_db: self.radar_noise_floor_db,
                speckle_radius: self.speckle_radius_m,
            },
            optical: OpticalParams {
                bands: self.optical_bands.clone(),
                cloud_filter_pct: self.cloud_filter_pct,
                mask: self.optical_mask.into(),
                ..Default::default()
            },
            decimals: self.decimals,
            append_ndvi: self.append_ndvi,
        })
    }

    fn has_band(&self, name: &str) -> bool {
        self.optical_bands.iter().any(|b| b == name)
    }
}

fn checked_range(range: Option<DateRange>, key: &str) -> Result<DateRange> {
    let range = range.ok_or_else(|| config_err(format!("{} is required", key)))?;
    DateRange::new(range.start, range.end).map_err(config_err)
}

/// Random forest and sampling options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub trees: usize,
    pub min_leaf_population: usize,
    pub bag_fraction: f64,
    pub max_nodes: Option<usize>,
    pub seed: u64,
    pub sample_scale_m: f64,
    /// Composite bands used as features; all bands when empty
    pub bands: Vec<String>,
    /// Radius applied to point labels; points sample one pixel when absent
    pub label_buffer_m: Option<f64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            trees: forest.trees,
            min_leaf_population: forest.min_leaf_population,
            bag_fraction: forest.bag_fraction,
            max_nodes: forest.max_nodes,
            seed: forest.seed,
            sample_scale_m: SampleParams::default().scale,
            bands: Vec::new(),
            label_buffer_m: Some(BufferParams::default().distance),
        }
    }
}

impl ClassifierConfig {
    pub fn to_params(&self) -> SupervisedParams {
        SupervisedParams {
            bands: self.bands.clone(),
            sample: SampleParams {
                scale: self.sample_scale_m,
            },
            label_buffer: self.label_buffer_m.map(|distance| BufferParams {
                distance,
                ..Default::default()
            }),
            forest: ForestParams {
                trees: self.trees,
                min_leaf_population: self.min_leaf_population,
                bag_fraction: self.bag_fraction,
                max_nodes: self.max_nodes,
                seed: self.seed,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Square,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Median,
    Majority,
}

/// Probability threshold and noise filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFilterConfig {
    pub threshold: f64,
    pub radius_px: usize,
    pub shape: ShapeKind,
    pub statistic: FilterKind,
}

impl Default for PostFilterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.55,
            radius_px: 1,
            shape: ShapeKind::Square,
            statistic: FilterKind::Median,
        }
    }
}

impl PostFilterConfig {
    pub fn to_params(&self) -> PostFilterParams {
        PostFilterParams {
            threshold: self.threshold,
            radius: self.radius_px,
            shape: match self.shape {
                ShapeKind::Square => WindowShape::Square,
                ShapeKind::Circle => WindowShape::Circle,
            },
            statistic: match self.statistic {
                FilterKind::Median => FocalStatistic::Median,
                FilterKind::Majority => FocalStatistic::Majority,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityKind {
    Four,
    #[default]
    Eight,
}

/// Vectorization bounds and candidate size filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeConfig {
    pub max_pixels: u64,
    pub max_vertices: Option<u64>,
    pub connectivity: ConnectivityKind,
    pub min_site_diameter_m: Option<f64>,
    pub max_site_diameter_m: Option<f64>,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        let params = VectorizeParams::default();
        Self {
            max_pixels: params.max_pixels,
            max_vertices: params.max_vertices,
            connectivity: ConnectivityKind::Eight,
            min_site_diameter_m: None,
            max_site_diameter_m: None,
        }
    }
}

impl VectorizeConfig {
    pub fn to_params(&self) -> VectorizeParams {
        VectorizeParams {
            connectivity: match self.connectivity {
                ConnectivityKind::Four => Connectivity::Four,
                ConnectivityKind::Eight => Connectivity::Eight,
            },
            max_pixels: self.max_pixels,
            max_vertices: self.max_vertices,
        }
    }

    /// Size filter, or `None` when neither bound is set
    pub fn size_filter(&self) -> moundscan_core::Result<Option<SizeFilter>> {
        if self.min_site_diameter_m.is_none() && self.max_site_diameter_m.is_none() {
            return Ok(None);
        }
        SizeFilter::new(self.min_site_diameter_m, self.max_site_diameter_m).map(Some)
    }
}

/// Export sink options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output cell size; the analysis grid is kept when absent
    pub resolution_m: Option<f64>,
    /// Largest raster the sink may write, in pixels
    pub max_pixels: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            resolution_m: None,
            max_pixels: VectorizeParams::default().max_pixels,
        }
    }
}
