//! Named multi-band rasters on a shared grid

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// An ordered set of named `f64` bands that all share one grid.
///
/// Every insertion checks alignment against the first band, so any stack
/// that exists is safe to feed into a per-pixel combining step.
#[derive(Debug, Clone, Default)]
pub struct BandStack {
    names: Vec<String>,
    bands: Vec<Raster<f64>>,
}

impl BandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a stack from `(name, raster)` pairs
    pub fn from_bands<I, S>(bands: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Raster<f64>)>,
        S: Into<String>,
    {
        let mut stack = Self::new();
        for (name, raster) in bands {
            stack.push(name, raster)?;
        }
        Ok(stack)
    }

    /// Append one band
    pub fn push(&mut self, name: impl Into<String>, band: Raster<f64>) -> Result<()> {
        let name = name.into();
        if self.names.iter().any(|n| *n == name) {
            return Err(Error::invalid_param("band", name, "duplicate band name"));
        }
        if let Some(first) = self.bands.first() {
            first
                .check_alignment(&band)
                .map_err(|e| Error::Alignment(format!("band '{}': {}", name, e)))?;
        }
        self.names.push(name);
        self.bands.push(band);
        Ok(())
    }

    /// Concatenate the bands of `other` after this stack's bands
    pub fn cat(mut self, other: BandStack) -> Result<Self> {
        for (name, band) in other.names.into_iter().zip(other.bands) {
            self.push(name, band)?;
        }
        Ok(self)
    }

    /// New stack holding the requested bands in the requested order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut out = Self::new();
        for name in names {
            let name = name.as_ref();
            out.push(name, self.band(name)?.clone())?;
        }
        Ok(out)
    }

    /// Band by name
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.bands[i])
            .ok_or_else(|| Error::NoData(format!("band '{}' not present", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn bands(&self) -> &[Raster<f64>] {
        &self.bands
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.names.iter().map(String::as_str).zip(self.bands.iter())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Shape and transform shared by every band
    pub fn grid(&self) -> Option<((usize, usize), GeoTransform)> {
        self.bands.first().map(|b| (b.shape(), *b.transform()))
    }

    /// First band, used as the grid template for derived layers
    pub fn template(&self) -> Result<&Raster<f64>> {
        self.bands
            .first()
            .ok_or_else(|| Error::NoData("band stack is empty".into()))
    }

    /// Values of every band at one pixel, in band order
    pub fn pixel(&self, row: usize, col: usize) -> Result<Vec<f64>> {
        self.bands.iter().map(|b| b.get(row, col)).collect()
    }

    /// Apply `f` to every band, keeping names
    pub fn map_bands<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&Raster<f64>) -> Result<Raster<f64>>,
    {
        let mut out = Self::new();
        for (name, band) in self.iter() {
            out.push(name, f(band)?)?;
        }
        Ok(out)
    }
}
