//! Point buffers for training labels
//!
//! Point labels mark site centers; they are widened to circles before
//! sampling so each label contributes the pixels of a whole site.

use geo::{Geometry, LineString, Point, Polygon};
use moundscan_core::vector::FeatureCollection;
use moundscan_core::{Error, Result};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer radius in ground units
    pub distance: f64,
    /// Number of segments to approximate the circle (default: 32)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 30.0,
            segments: 32,
        }
    }
}

/// Polygon approximating a circle of `params.distance` around a point
pub fn buffer_point(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let (cx, cy) = (point.x(), point.y());

    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Replace point geometries with circular buffers; other geometries pass through
pub fn buffer_labels(labels: &FeatureCollection, params: &BufferParams) -> Result<FeatureCollection> {
    if !(params.distance > 0.0) || !params.distance.is_finite() {
        return Err(Error::invalid_param("label_buffer", params.distance, "must be positive"));
    }
    Ok(labels
        .iter()
        .map(|feature| {
            let mut out = feature.clone();
            if let Some(Geometry::Point(p)) = &feature.geometry {
                out.geometry = Some(Geometry::Polygon(buffer_point(p, params)));
            }
            out
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains};
    use moundscan_core::vector::Feature;

    #[test]
    fn test_buffer_point_circle() {
        let params = BufferParams {
            distance: 10.0,
            segments: 64,
        };
        let circle = buffer_point(&Point::new(5.0, 5.0), &params);
        let area = circle.unsigned_area();
        let expected = PI * 100.0;
        assert!((area - expected).abs() / expected < 0.01, "area {}", area);
        assert!(circle.contains(&Point::new(12.0, 5.0)));
    }

    #[test]
    fn test_buffer_labels_keeps_properties() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Point::new(0.0, 0.0)).with_property("class", 1i64));
        let out = buffer_labels(&fc, &BufferParams::default()).unwrap();
        assert!(matches!(out.features[0].geometry, Some(Geometry::Polygon(_))));
        assert_eq!(out.features[0].get_property("class"), fc.features[0].get_property("class"));
        assert!(buffer_labels(&fc, &BufferParams { distance: 0.0, segments: 8 }).is_err());
    }
}
