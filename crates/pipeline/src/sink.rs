//! Export sinks: where detection artifacts are written
//!
//! Every sink enforces a maximum raster size before writing. Rasters whose
//! cell size differs from the requested resolution are resampled onto a grid
//! of that resolution covering the region.

use moundscan_core::io::{write_geojson, write_geotiff};
use moundscan_core::raster::{Raster, resample_nearest};
use moundscan_core::vector::FeatureCollection;
use moundscan_core::{Error, Region, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Name of the index file written by [`DirectorySink`]
pub const INDEX_FILE: &str = "exports.json";

/// A detection output handed to a sink
#[derive(Debug, Clone)]
pub enum Artifact {
    Raster(Raster<f64>),
    Vector(FeatureCollection),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Raster(_) => ArtifactKind::Raster,
            Artifact::Vector(_) => ArtifactKind::Vector,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Raster,
    Vector,
}

/// What a sink wrote for one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub name: String,
    pub kind: ArtifactKind,
    /// Cell size of the written raster, or the requested one for vectors
    pub resolution: f64,
    /// Pixel count for rasters, feature count for vectors
    pub size: u64,
    pub path: Option<PathBuf>,
}

/// Destination of detection artifacts
pub trait ExportSink: Send {
    /// Write `artifact` under `name`, restricted to `region` at `resolution`.
    ///
    /// # Errors
    /// * `ResourceLimit` if the raster would exceed the sink's pixel bound
    fn write(&mut self, artifact: &Artifact, name: &str, region: &Region, resolution: f64) -> Result<ExportRecord>;
}

/// Estimated pixel count of `region` at `resolution`
pub fn export_pixels(region: &Region, resolution: f64) -> u64 {
    (region.area() / (resolution * resolution)).ceil() as u64
}

/// Bring `raster` onto a `resolution` grid over `region`, masking outside cells.
///
/// # Errors
/// * `ResourceLimit` if the estimated pixel count exceeds `max_pixels`
/// * `Alignment` if resampling would need reprojection
pub fn prepare_raster(
    raster: &Raster<f64>,
    region: &Region,
    resolution: f64,
    max_pixels: u64,
) -> Result<Raster<f64>> {
    if !(resolution > 0.0) || !resolution.is_finite() {
        return Err(Error::invalid_param("resolution", resolution, "must be positive"));
    }
    let pixels = export_pixels(region, resolution);
    if pixels > max_pixels {
        return Err(Error::ResourceLimit {
            what: "export pixels",
            actual: pixels,
            limit: max_pixels,
        });
    }

    if (raster.cell_size() - resolution).abs() <= 1e-9 * resolution {
        region.mask(raster)
    } else {
        let grid = region.grid(resolution, raster.crs().cloned())?;
        let resampled = resample_nearest(raster, &grid)?;
        region.mask(&resampled)
    }
}

fn record(artifact: &Artifact, name: &str, resolution: f64, path: Option<PathBuf>) -> ExportRecord {
    let size = match artifact {
        Artifact::Raster(r) => r.len() as u64,
        Artifact::Vector(fc) => fc.len() as u64,
    };
    ExportRecord {
        name: name.to_string(),
        kind: artifact.kind(),
        resolution,
        size,
        path,
    }
}

fn prepare(artifact: &Artifact, region: &Region, resolution: f64, max_pixels: u64) -> Result<Artifact> {
    Ok(match artifact {
        Artifact::Raster(r) => Artifact::Raster(prepare_raster(r, region, resolution, max_pixels)?),
        Artifact::Vector(fc) => Artifact::Vector(fc.clone()),
    })
}

/// Sink keeping artifacts in memory; clones share the same storage
#[derive(Debug, Clone)]
pub struct MemorySink {
    max_pixels: u64,
    exports: Arc<Mutex<Vec<(ExportRecord, Artifact)>>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl MemorySink {
    pub fn new(max_pixels: u64) -> Self {
        Self {
            max_pixels,
            exports: Arc::default(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<(ExportRecord, Artifact)>>> {
        self.exports
            .lock()
            .map_err(|_| Error::Other("memory sink lock poisoned".into()))
    }

    pub fn records(&self) -> Vec<ExportRecord> {
        self.lock()
            .map(|exports| exports.iter().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default()
    }

    /// Artifact written under `name`
    pub fn get(&self, name: &str) -> Option<Artifact> {
        self.lock()
            .ok()?
            .iter()
            .find(|(r, _)| r.name == name)
            .map(|(_, a)| a.clone())
    }
}

impl ExportSink for MemorySink {
    fn write(&mut self, artifact: &Artifact, name: &str, region: &Region, resolution: f64) -> Result<ExportRecord> {
        let prepared = prepare(artifact, region, resolution, self.max_pixels)?;
        let rec = record(&prepared, name, resolution, None);
        self.lock()?.push((rec.clone(), prepared));
        Ok(rec)
    }
}

/// Sink writing GeoTIFF rasters and GeoJSON vectors into a directory, with
/// an `exports.json` index rewritten after every artifact
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    max_pixels: u64,
    records: Vec<ExportRecord>,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn create<P: AsRef<Path>>(dir: P, max_pixels: u64) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            max_pixels,
            records: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    fn write_index(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.records).map_err(|e| Error::Other(e.to_string()))?;
        std::fs::write(self.dir.join(INDEX_FILE), text)?;
        Ok(())
    }
}

impl ExportSink for DirectorySink {
    fn write(&mut self, artifact: &Artifact, name: &str, region: &Region, resolution: f64) -> Result<ExportRecord> {
        let prepared = prepare(artifact, region, resolution, self.max_pixels)?;
        let path = match &prepared {
            Artifact::Raster(r) => {
                let path = self.dir.join(format!("{}.tif", name));
                write_geotiff(r, &path)?;
                path
            }
            Artifact::Vector(fc) => {
                let path = self.dir.join(format!("{}.geojson", name));
                write_geojson(fc, &path)?;
                path
            }
        };
        info!(artifact = name, path = %path.display(), "exported");

        let rec = record(&prepared, name, resolution, Some(path));
        self.records.push(rec.clone());
        self.write_index()?;
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moundscan_core::GeoTransform;
    use moundscan_core::io::{read_band, read_geojson};
    use moundscan_core::vector::Feature;

    fn prob() -> Raster<f64> {
        Raster::filled(10, 10, 0.5).with_transform(GeoTransform::north_up(0.0, 100.0, 10.0))
    }

    fn region() -> Region {
        Region::polygon(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]).unwrap()
    }

    #[test]
    fn test_memory_sink_keeps_native_grid() {
        let mut sink = MemorySink::default();
        let handle = sink.clone();
        let rec = sink.write(&Artifact::Raster(prob()), "it1_probability", &region(), 10.0).unwrap();
        assert_eq!(rec.kind, ArtifactKind::Raster);
        assert_eq!(rec.size, 100);
        assert!(rec.path.is_none());

        match handle.get("it1_probability") {
            Some(Artifact::Raster(r)) => {
                assert_eq!(r.shape(), (10, 10));
                assert_eq!(r.get(5, 5).unwrap(), 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.records().len(), 1);
    }

    #[test]
    fn test_resample_to_coarser_resolution() {
        let mut sink = MemorySink::default();
        let rec = sink.write(&Artifact::Raster(prob()), "p", &region(), 20.0).unwrap();
        assert_eq!(rec.size, 25);
        assert_eq!(rec.resolution, 20.0);
    }

    #[test]
    fn test_pixel_bound() {
        let mut sink = MemorySink::new(50);
        let err = sink.write(&Artifact::Raster(prob()), "p", &region(), 10.0).unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimit { actual: 100, limit: 50, .. }
        ));
        assert!(sink.records().is_empty());
        // vectors carry no raster bound
        let fc = FeatureCollection::new();
        assert!(sink.write(&Artifact::Vector(fc), "v", &region(), 10.0).is_ok());
    }

    #[test]
    fn test_directory_sink_writes_files_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path().join("out"), u64::MAX).unwrap();

        sink.write(&Artifact::Raster(prob()), "it2_probability", &region(), 10.0).unwrap();
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(geo::Point::new(50.0, 50.0)).with_property("id", 1i64));
        sink.write(&Artifact::Vector(fc.clone()), "it2_candidates", &region(), 10.0).unwrap();

        let out = dir.path().join("out");
        let raster = read_band(out.join("it2_probability.tif")).unwrap();
        assert_eq!(raster.shape(), (10, 10));
        assert_eq!(read_geojson(out.join("it2_candidates.geojson")).unwrap(), fc);

        let index: Vec<ExportRecord> =
            serde_json::from_str(&std::fs::read_to_string(out.join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index[1].kind, ArtifactKind::Vector);
        assert_eq!(index, sink.records());
    }
}
