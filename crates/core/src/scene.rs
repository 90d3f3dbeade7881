//! Satellite scene descriptors consumed by the composite builder

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::raster::BandStack;

/// Orbit pass (look direction) of a radar acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrbitPass {
    Ascending,
    Descending,
}

impl OrbitPass {
    /// Single-letter suffix used in composite band names
    pub fn suffix(&self) -> char {
        match self {
            OrbitPass::Ascending => 'a',
            OrbitPass::Descending => 'd',
        }
    }
}

impl fmt::Display for OrbitPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbitPass::Ascending => write!(f, "ASCENDING"),
            OrbitPass::Descending => write!(f, "DESCENDING"),
        }
    }
}

/// Radar polarisation channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarisation {
    VV,
    VH,
}

impl Polarisation {
    /// Band name inside a radar scene
    pub fn band_name(&self) -> &'static str {
        match self {
            Polarisation::VV => "VV",
            Polarisation::VH => "VH",
        }
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::invalid_param(
                "date_range",
                format!("{}..{}", start, end),
                "end precedes start",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One dual-polarisation SAR acquisition with backscatter in dB.
///
/// `bands` holds one band per polarisation present, named `VV` / `VH`.
#[derive(Debug, Clone)]
pub struct RadarScene {
    pub id: String,
    pub acquired: NaiveDate,
    pub pass: OrbitPass,
    pub instrument_mode: String,
    pub bands: BandStack,
}

impl RadarScene {
    /// Whether the scene carries every requested polarisation
    pub fn has_polarisations(&self, pols: &[Polarisation]) -> bool {
        pols.iter().all(|p| self.bands.contains(p.band_name()))
    }
}

/// One multispectral optical acquisition with raw digital numbers.
///
/// `bands` holds the reflectance bands (`B2` .. `B12`) and the quality band
/// used for masking (`QA60` for top-of-atmosphere, `SCL` for surface
/// reflectance products).
#[derive(Debug, Clone)]
pub struct OpticalScene {
    pub id: String,
    pub acquired: NaiveDate,
    /// Scene-level cloudy pixel percentage from the product metadata
    pub cloudy_pixel_percentage: f64,
    pub bands: BandStack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let range = DateRange::new(d("2021-01-01"), d("2021-12-31")).unwrap();
        assert!(range.contains(d("2021-06-15")));
        assert!(range.contains(d("2021-12-31")));
        assert!(!range.contains(d("2022-01-01")));
        assert!(DateRange::new(d("2021-02-01"), d("2021-01-01")).is_err());
    }

    #[test]
    fn test_pass_serde_names() {
        let json = serde_json::to_string(&OrbitPass::Descending).unwrap();
        assert_eq!(json, "\"DESCENDING\"");
        assert_eq!(OrbitPass::Ascending.suffix(), 'a');
    }
}
