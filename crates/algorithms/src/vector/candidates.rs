//! Candidate attributes and size filtering

use geo::{Area, Centroid, Geometry};
use moundscan_core::raster::Raster;
use moundscan_core::vector::{AttributeValue, Feature, FeatureCollection};
use moundscan_core::{Error, Result};
use std::f64::consts::PI;

use super::vectorize::Vectorized;

/// Accepted range of equivalent-circle diameters, in ground units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeFilter {
    pub min_diameter: Option<f64>,
    pub max_diameter: Option<f64>,
}

impl SizeFilter {
    pub fn new(min_diameter: Option<f64>, max_diameter: Option<f64>) -> Result<Self> {
        for (name, bound) in [("min_site_diameter", min_diameter), ("max_site_diameter", max_diameter)] {
            if let Some(d) = bound
                && !(d >= 0.0 && d.is_finite())
            {
                return Err(Error::invalid_param(name, d, "must be a non-negative number"));
            }
        }
        if let (Some(lo), Some(hi)) = (min_diameter, max_diameter)
            && lo > hi
        {
            return Err(Error::invalid_param(
                "min_site_diameter",
                lo,
                format!("exceeds max_site_diameter {}", hi),
            ));
        }
        Ok(Self { min_diameter, max_diameter })
    }

    pub fn accepts(&self, diameter: f64) -> bool {
        self.min_diameter.is_none_or(|lo| diameter >= lo) && self.max_diameter.is_none_or(|hi| diameter <= hi)
    }
}

/// Diameter of the circle with the given area
pub fn equivalent_diameter(area: f64) -> f64 {
    2.0 * (area / PI).sqrt()
}

/// Keep candidates whose equivalent diameter lies within the filter bounds.
///
/// Features without a geometry are dropped.
pub fn filter_candidates(candidates: &FeatureCollection, filter: &SizeFilter) -> FeatureCollection {
    candidates
        .iter()
        .filter(|f| {
            f.geometry
                .as_ref()
                .is_some_and(|g| filter.accepts(equivalent_diameter(g.unsigned_area())))
        })
        .cloned()
        .collect()
}

/// Attach per-candidate statistics of `prob` to the traced polygons.
///
/// Every feature gets `id`, `run_id`, `pixel_count`, `area_m2`,
/// `max_probability`, `mean_probability`, `centroid_x` and `centroid_y`.
/// Probabilities ignore NaN pixels and are null when a component has none.
pub fn attach_probability_stats(
    vectorized: &Vectorized,
    prob: &Raster<f64>,
    run_id: &str,
) -> Result<FeatureCollection> {
    let labels = vectorized.components.labels();
    prob.check_alignment(labels)?;
    let pixel_area = labels.transform().pixel_area();

    let mut out = FeatureCollection::new();
    for (feature, (id, pixels)) in vectorized.polygons.iter().zip(vectorized.components.iter()) {
        let values: Vec<f64> = pixels
            .iter()
            .map(|&(r, c)| unsafe { prob.get_unchecked(r, c) })
            .filter(|v| !v.is_nan())
            .collect();
        let (max, mean) = if values.is_empty() {
            (AttributeValue::Null, AttributeValue::Null)
        } else {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (AttributeValue::Float(max), AttributeValue::Float(mean))
        };
        let centroid = feature.geometry.as_ref().and_then(Geometry::centroid);

        let mut candidate = Feature {
            geometry: feature.geometry.clone(),
            properties: Default::default(),
            id: Some(id.to_string()),
        };
        candidate.set_property("id", id as i64);
        candidate.set_property("run_id", run_id);
        candidate.set_property("pixel_count", pixels.len() as i64);
        candidate.set_property("area_m2", pixels.len() as f64 * pixel_area);
        candidate.set_property("max_probability", max);
        candidate.set_property("mean_probability", mean);
        candidate.set_property("centroid_x", centroid.map_or(AttributeValue::Null, |p| p.x().into()));
        candidate.set_property("centroid_y", centroid.map_or(AttributeValue::Null, |p| p.y().into()));
        out.push(candidate);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{VectorizeParams, vectorize};
    use moundscan_core::{CancelToken, GeoTransform};

    fn scene() -> (Raster<u8>, Raster<f64>) {
        let transform = GeoTransform::north_up(0.0, 20.0, 2.0);
        let mut mask: Raster<u8> = Raster::new(10, 10).with_transform(transform);
        let mut prob = Raster::filled(10, 10, 0.1).with_transform(transform);
        for row in 1..4 {
            for col in 1..4 {
                mask.set(row, col, 1).unwrap();
                prob.set(row, col, 0.7).unwrap();
            }
        }
        prob.set(2, 2, 0.95).unwrap();
        mask.set(8, 8, 1).unwrap();
        prob.set(8, 8, f64::NAN).unwrap();
        (mask, prob)
    }

    #[test]
    fn test_attributes() {
        let (mask, prob) = scene();
        let vectorized = vectorize(&mask, &VectorizeParams::default(), &CancelToken::new()).unwrap();
        let fc = attach_probability_stats(&vectorized, &prob, "it7").unwrap();
        assert_eq!(fc.len(), 2);

        let block = &fc.features[0];
        assert_eq!(block.get_property("id"), Some(&AttributeValue::Int(1)));
        assert_eq!(block.get_property("run_id"), Some(&AttributeValue::from("it7")));
        assert_eq!(block.get_property("pixel_count"), Some(&AttributeValue::Int(9)));
        assert_eq!(block.get_property("area_m2"), Some(&AttributeValue::Float(36.0)));
        assert_eq!(block.get_property("max_probability"), Some(&AttributeValue::Float(0.95)));
        let mean = block.get_property("mean_probability").and_then(AttributeValue::as_f64).unwrap();
        assert!((mean - (8.0 * 0.7 + 0.95) / 9.0).abs() < 1e-12);
        let cx = block.get_property("centroid_x").and_then(AttributeValue::as_f64).unwrap();
        let cy = block.get_property("centroid_y").and_then(AttributeValue::as_f64).unwrap();
        assert!((cx - 5.0).abs() < 1e-9 && (cy - 15.0).abs() < 1e-9);

        assert_eq!(fc.features[1].get_property("max_probability"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_size_filter() {
        let (mask, prob) = scene();
        let vectorized = vectorize(&mask, &VectorizeParams::default(), &CancelToken::new()).unwrap();
        let fc = attach_probability_stats(&vectorized, &prob, "it7").unwrap();

        // 36 m2 -> 6.77 m, 4 m2 -> 2.26 m
        let kept = filter_candidates(&fc, &SizeFilter::new(Some(5.0), Some(30.0)).unwrap());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.features[0].id.as_deref(), Some("1"));
        assert_eq!(filter_candidates(&fc, &SizeFilter::default()).len(), 2);
        assert!(filter_candidates(&fc, &SizeFilter::new(None, Some(2.0)).unwrap()).is_empty());
    }

    #[test]
    fn test_filter_bounds_validation() {
        assert!(SizeFilter::new(Some(30.0), Some(5.0)).is_err());
        assert!(SizeFilter::new(Some(-1.0), None).is_err());
        assert!((equivalent_diameter(PI) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_misaligned_probability() {
        let (mask, _) = scene();
        let vectorized = vectorize(&mask, &VectorizeParams::default(), &CancelToken::new()).unwrap();
        let other = Raster::filled(5, 5, 0.5);
        assert!(matches!(
            attach_probability_stats(&vectorized, &other, "x"),
            Err(Error::Alignment(_))
        ));
    }
}
