//! Raster sources: where elevation, scenes and labels come from
//!
//! A [`RasterSource`] hands out immutable inputs for one region. Two
//! implementations ship with the crate:
//!
//! - [`MemorySource`]: values built in memory (tests, embedding)
//! - [`ManifestSource`]: GeoTIFF and GeoJSON files listed in a JSON manifest

use chrono::NaiveDate;
use moundscan_algorithms::imagery::SceneCollections;
use moundscan_core::io::{read_band, read_geojson};
use moundscan_core::raster::{BandStack, Raster};
use moundscan_core::scene::{DateRange, OpticalScene, OrbitPass, RadarScene};
use moundscan_core::vector::FeatureCollection;
use moundscan_core::{Error, Region, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Training labels: known sites and everything else
#[derive(Debug, Clone, Default)]
pub struct LabelSets {
    pub positives: FeatureCollection,
    pub others: FeatureCollection,
}

/// Provider of the raw inputs of a detection run
pub trait RasterSource: Send + Sync {
    /// Elevation model covering `region`
    fn elevation(&self, region: &Region) -> Result<Raster<f64>>;

    /// Radar scenes acquired within `dates` whose footprint meets `region`
    fn radar_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<RadarScene>>;

    /// Optical scenes acquired within `dates` whose footprint meets `region`
    fn optical_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<OpticalScene>>;

    /// Site and non-site training labels
    fn labels(&self) -> Result<LabelSets>;

    /// Scenes of either sensor acquired within `dates`, overlapping `region`
    /// and carrying every band in `bands`.
    ///
    /// # Errors
    /// * `NoData` if no scene qualifies
    fn fetch(&self, bands: &[&str], region: &Region, dates: &DateRange) -> Result<SceneCollections> {
        let scenes = SceneCollections {
            radar: self
                .radar_scenes(region, dates)?
                .into_iter()
                .filter(|s| carries(&s.bands, bands))
                .collect(),
            optical: self
                .optical_scenes(region, dates)?
                .into_iter()
                .filter(|s| carries(&s.bands, bands))
                .collect(),
        };
        qualified(scenes, bands, dates)
    }
}

fn carries(stack: &BandStack, bands: &[&str]) -> bool {
    bands.iter().all(|b| stack.contains(b))
}

/// Whether a scene's footprint contains any pixel of `region`
fn overlaps(id: &str, stack: &BandStack, region: &Region) -> bool {
    let hit = stack.template().is_ok_and(|band| region.intersects(band));
    if !hit {
        debug!(scene = id, "scene misses the region; skipped");
    }
    hit
}

fn qualified(scenes: SceneCollections, bands: &[&str], dates: &DateRange) -> Result<SceneCollections> {
    if scenes.radar.is_empty() && scenes.optical.is_empty() {
        return Err(Error::NoData(format!(
            "no scene in {} covers the region with bands {:?}",
            dates, bands
        )));
    }
    debug!(radar = scenes.radar.len(), optical = scenes.optical.len(), ?bands, "scenes fetched");
    Ok(scenes)
}

/// Source backed by values held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    elevation: Option<Raster<f64>>,
    radar: Vec<RadarScene>,
    optical: Vec<OpticalScene>,
    labels: LabelSets,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elevation(mut self, dem: Raster<f64>) -> Self {
        self.elevation = Some(dem);
        self
    }

    pub fn with_radar(mut self, scenes: Vec<RadarScene>) -> Self {
        self.radar = scenes;
        self
    }

    pub fn with_optical(mut self, scenes: Vec<OpticalScene>) -> Self {
        self.optical = scenes;
        self
    }

    pub fn with_labels(mut self, positives: FeatureCollection, others: FeatureCollection) -> Self {
        self.labels = LabelSets { positives, others };
        self
    }
}

impl RasterSource for MemorySource {
    fn elevation(&self, region: &Region) -> Result<Raster<f64>> {
        let dem = self
            .elevation
            .as_ref()
            .ok_or_else(|| Error::NoData("source has no elevation model".into()))?;
        region.clip(dem)
    }

    fn radar_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<RadarScene>> {
        Ok(self
            .radar
            .iter()
            .filter(|s| dates.contains(s.acquired) && overlaps(&s.id, &s.bands, region))
            .cloned()
            .collect())
    }

    fn optical_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<OpticalScene>> {
        Ok(self
            .optical
            .iter()
            .filter(|s| dates.contains(s.acquired) && overlaps(&s.id, &s.bands, region))
            .cloned()
            .collect())
    }

    fn labels(&self) -> Result<LabelSets> {
        Ok(self.labels.clone())
    }
}

/// JSON manifest listing the files of a [`ManifestSource`].
///
/// Paths are relative to the manifest's directory unless absolute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub elevation: Option<PathBuf>,
    pub radar: Vec<RadarEntry>,
    pub optical: Vec<OpticalEntry>,
    pub labels: Option<LabelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarEntry {
    pub id: String,
    pub acquired: NaiveDate,
    pub pass: OrbitPass,
    #[serde(default = "default_instrument_mode")]
    pub instrument_mode: String,
    /// Polarisation name to GeoTIFF path
    pub bands: BTreeMap<String, PathBuf>,
}

fn default_instrument_mode() -> String {
    "IW".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalEntry {
    pub id: String,
    pub acquired: NaiveDate,
    pub cloudy_pixel_percentage: f64,
    /// Band name to GeoTIFF path, quality band included
    pub bands: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub positives: PathBuf,
    pub others: PathBuf,
}

/// Source reading GeoTIFF scenes and GeoJSON labels listed in a manifest.
///
/// Files are read on demand; scenes outside the requested dates are never
/// opened.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    base: PathBuf,
    manifest: Manifest,
}

impl ManifestSource {
    /// Open a manifest file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| Error::Other(format!("invalid manifest {}: {}", path.display(), e)))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::from_manifest(base, manifest))
    }

    pub fn from_manifest(base: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            base: base.into(),
            manifest,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn read_stack(&self, bands: &BTreeMap<String, PathBuf>) -> Result<BandStack> {
        let mut stack = BandStack::new();
        for (name, path) in bands {
            stack.push(name.clone(), read_band(self.resolve(path))?)?;
        }
        Ok(stack)
    }

    fn read_radar(&self, region: &Region, dates: &DateRange, bands: &[&str]) -> Result<Vec<RadarScene>> {
        let mut scenes = Vec::new();
        for e in &self.manifest.radar {
            if !dates.contains(e.acquired) || !bands.iter().all(|b| e.bands.contains_key(*b)) {
                continue;
            }
            debug!(scene = %e.id, "reading radar scene");
            let stack = self.read_stack(&e.bands)?;
            if overlaps(&e.id, &stack, region) {
                scenes.push(RadarScene {
                    id: e.id.clone(),
                    acquired: e.acquired,
                    pass: e.pass,
                    instrument_mode: e.instrument_mode.clone(),
                    bands: stack,
                });
            }
        }
        Ok(scenes)
    }

    fn read_optical(&self, region: &Region, dates: &DateRange, bands: &[&str]) -> Result<Vec<OpticalScene>> {
        let mut scenes = Vec::new();
        for e in &self.manifest.optical {
            if !dates.contains(e.acquired) || !bands.iter().all(|b| e.bands.contains_key(*b)) {
                continue;
            }
            debug!(scene = %e.id, "reading optical scene");
            let stack = self.read_stack(&e.bands)?;
            if overlaps(&e.id, &stack, region) {
                scenes.push(OpticalScene {
                    id: e.id.clone(),
                    acquired: e.acquired,
                    cloudy_pixel_percentage: e.cloudy_pixel_percentage,
                    bands: stack,
                });
            }
        }
        Ok(scenes)
    }
}

impl RasterSource for ManifestSource {
    fn elevation(&self, region: &Region) -> Result<Raster<f64>> {
        let path = self
            .manifest
            .elevation
            .as_ref()
            .ok_or_else(|| Error::NoData("manifest lists no elevation model".into()))?;
        region.clip(&read_band(self.resolve(path))?)
    }

    fn radar_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<RadarScene>> {
        self.read_radar(region, dates, &[])
    }

    fn optical_scenes(&self, region: &Region, dates: &DateRange) -> Result<Vec<OpticalScene>> {
        self.read_optical(region, dates, &[])
    }

    fn labels(&self) -> Result<LabelSets> {
        let entry = self
            .manifest
            .labels
            .as_ref()
            .ok_or_else(|| Error::NoData("manifest lists no training labels".into()))?;
        Ok(LabelSets {
            positives: read_geojson(self.resolve(&entry.positives))?,
            others: read_geojson(self.resolve(&entry.others))?,
        })
    }

    /// Entries lacking a requested band are skipped before any file is read
    fn fetch(&self, bands: &[&str], region: &Region, dates: &DateRange) -> Result<SceneCollections> {
        let scenes = SceneCollections {
            radar: self.read_radar(region, dates, bands)?,
            optical: self.read_optical(region, dates, bands)?,
        };
        qualified(scenes, bands, dates)
    }
}
