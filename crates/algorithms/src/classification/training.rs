//! Training samples drawn from labeled geometries
//!
//! Two label sets are merged: positive sites keep their class attribute,
//! the "other" set is forced to class 0 whatever its source attribute says.
//! Sampling then reads every composite band at the pixels each geometry
//! covers.

use geo::{BoundingRect, Contains, Geometry, Point};
use moundscan_core::raster::BandStack;
use moundscan_core::vector::{AttributeValue, FeatureCollection};
use moundscan_core::{Error, Result};
use std::collections::BTreeSet;

/// Attribute holding the class label
pub const CLASS_PROPERTY: &str = "class";

/// One labeled pixel with a value per band
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub class: u8,
    pub values: Vec<f64>,
}

/// Samples plus the band order their values follow
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub bands: Vec<String>,
    pub samples: Vec<TrainingSample>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distinct class values present
    pub fn classes(&self) -> BTreeSet<u8> {
        self.samples.iter().map(|s| s.class).collect()
    }

    /// Fail unless at least two classes are present and every value is finite
    pub fn validate(&self) -> Result<()> {
        if let Some((i, s)) = self
            .samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.values.len() != self.bands.len() || s.values.iter().any(|v| !v.is_finite()))
        {
            return Err(Error::InvalidSample(format!(
                "sample {} (class {}) has a missing band value",
                i, s.class
            )));
        }
        let classes = self.classes();
        if classes.len() < 2 {
            return Err(Error::InvalidSample(format!(
                "need at least two classes, found {:?} in {} samples",
                classes,
                self.samples.len()
            )));
        }
        Ok(())
    }
}

/// Set the class attribute of every feature to `class`. Idempotent.
pub fn force_class(labels: &FeatureCollection, class: i64) -> FeatureCollection {
    labels
        .iter()
        .map(|f| f.clone().with_property(CLASS_PROPERTY, class))
        .collect()
}

/// Merge positive site labels with the "other" set, forcing the latter to class 0
pub fn merge_labels(positives: &FeatureCollection, others: &FeatureCollection) -> FeatureCollection {
    positives
        .iter()
        .cloned()
        .chain(force_class(others, 0))
        .collect()
}

/// Sampling options
#[derive(Debug, Clone, PartialEq)]
pub struct SampleParams {
    /// Sampling resolution in ground units; coarser than the composite
    /// keeps every n-th pixel in both directions
    pub scale: f64,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self { scale: 10.0 }
    }
}

/// Read `composite` at every labeled geometry.
///
/// Points sample the pixel containing them; polygons sample every pixel on
/// the sampling lattice whose center they contain.
///
/// # Errors
/// * `InvalidSample` if a label lacks an integral class in 0..=255, a sampled
///   pixel has a missing band value, or fewer than two classes are sampled
pub fn sample_regions(
    composite: &BandStack,
    labels: &FeatureCollection,
    params: &SampleParams,
) -> Result<TrainingSet> {
    let template = composite.template()?;
    let cell = template.cell_size();
    if !(params.scale > 0.0) {
        return Err(Error::invalid_param("scale", params.scale, "must be positive"));
    }
    let stride = ((params.scale / cell).round() as usize).max(1);

    let mut samples = Vec::new();
    for (i, feature) in labels.iter().enumerate() {
        let class = label_class(feature.get_property(CLASS_PROPERTY))
            .ok_or_else(|| Error::InvalidSample(format!("label {} has no usable '{}'", i, CLASS_PROPERTY)))?;
        let Some(geometry) = &feature.geometry else {
            continue;
        };

        for (row, col) in covered_pixels(geometry, composite, stride) {
            samples.push(TrainingSample {
                class,
                values: composite.pixel(row, col)?,
            });
        }
    }

    let set = TrainingSet {
        bands: composite.names().to_vec(),
        samples,
    };
    set.validate()?;
    Ok(set)
}

fn label_class(value: Option<&AttributeValue>) -> Option<u8> {
    value?.as_i64().and_then(|v| u8::try_from(v).ok())
}

fn covered_pixels(geometry: &Geometry<f64>, composite: &BandStack, stride: usize) -> Vec<(usize, usize)> {
    let Ok(template) = composite.template() else {
        return Vec::new();
    };

    if let Geometry::Point(p) = geometry {
        return template.locate(p.x(), p.y()).into_iter().collect();
    }

    let Some(rect) = geometry.bounding_rect() else {
        return Vec::new();
    };
    let t = template.transform();
    let (c0, r0) = t.geo_to_pixel(rect.min().x, rect.max().y);
    let (c1, r1) = t.geo_to_pixel(rect.max().x, rect.min().y);
    let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64) as usize;
    let (row_lo, row_hi) = (clamp(r0.min(r1).floor(), template.rows()), clamp(r0.max(r1).ceil(), template.rows()));
    let (col_lo, col_hi) = (clamp(c0.min(c1).floor(), template.cols()), clamp(c0.max(c1).ceil(), template.cols()));

    let mut out = Vec::new();
    for row in (row_lo..row_hi).filter(|r| r % stride == 0) {
        for col in (col_lo..col_hi).filter(|c| c % stride == 0) {
            let (x, y) = template.pixel_to_geo(col, row);
            if geometry.contains(&Point::new(x, y)) {
                out.push((row, col));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use moundscan_core::raster::Raster;
    use moundscan_core::vector::Feature;
    use moundscan_core::GeoTransform;

    fn composite() -> BandStack {
        let mut a = Raster::new(10, 10).with_transform(GeoTransform::north_up(0.0, 100.0, 10.0));
        let mut b = a.clone();
        for row in 0..10 {
            for col in 0..10 {
                a.set(row, col, row as f64).unwrap();
                b.set(row, col, col as f64).unwrap();
            }
        }
        BandStack::from_bands([("B2", a), ("B3", b)]).unwrap()
    }

    fn point(x: f64, y: f64) -> Feature {
        Feature::new(Point::new(x, y))
    }

    #[test]
    fn test_force_class_is_idempotent() {
        let mut others = FeatureCollection::new();
        others.push(point(1.0, 1.0).with_property(CLASS_PROPERTY, 1i64));
        others.push(point(2.0, 2.0));
        others.push(point(3.0, 3.0).with_property(CLASS_PROPERTY, "1"));

        let once = force_class(&others, 0);
        let twice = force_class(&once, 0);
        assert_eq!(once, twice);
        let classes: BTreeSet<Option<i64>> = once
            .iter()
            .map(|f| f.get_property(CLASS_PROPERTY).and_then(|v| v.as_i64()))
            .collect();
        assert_eq!(classes, BTreeSet::from([Some(0)]));
    }

    #[test]
    fn test_merge_keeps_positive_classes() {
        let positives: FeatureCollection =
            vec![point(5.0, 95.0).with_property(CLASS_PROPERTY, 1i64)].into_iter().collect();
        let others: FeatureCollection =
            vec![point(95.0, 5.0).with_property(CLASS_PROPERTY, 1i64)].into_iter().collect();
        let merged = merge_labels(&positives, &others);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.features[0].get_property(CLASS_PROPERTY), Some(&AttributeValue::Int(1)));
        assert_eq!(merged.features[1].get_property(CLASS_PROPERTY), Some(&AttributeValue::Int(0)));
    }

    #[test]
    fn test_sample_points_and_polygons() {
        let mut labels = FeatureCollection::new();
        labels.push(point(35.0, 75.0).with_property(CLASS_PROPERTY, 1i64));
        let square = polygon![(x: 60.0, y: 0.0), (x: 80.0, y: 0.0), (x: 80.0, y: 20.0), (x: 60.0, y: 20.0)];
        labels.push(Feature::new(square).with_property(CLASS_PROPERTY, 0i64));

        let set = sample_regions(&composite(), &labels, &SampleParams::default()).unwrap();
        assert_eq!(set.bands, vec!["B2".to_string(), "B3".to_string()]);
        assert_eq!(set.len(), 5);
        assert_eq!(set.samples[0], TrainingSample { class: 1, values: vec![2.0, 3.0] });
        assert!(set.samples[1..].iter().all(|s| s.class == 0));
        assert_eq!(set.classes(), BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_single_class_fails() {
        let labels: FeatureCollection =
            vec![point(35.0, 75.0).with_property(CLASS_PROPERTY, 1i64)].into_iter().collect();
        let err = sample_regions(&composite(), &labels, &SampleParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidSample(_)));
    }

    #[test]
    fn test_missing_band_value_fails() {
        let mut stack = composite();
        let mut b4: Raster<f64> = stack.band("B2").unwrap().clone();
        b4.set(2, 3, f64::NAN).unwrap();
        stack.push("B4", b4).unwrap();

        let labels: FeatureCollection = vec![
            point(35.0, 75.0).with_property(CLASS_PROPERTY, 1i64),
            point(95.0, 5.0).with_property(CLASS_PROPERTY, 0i64),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            sample_regions(&stack, &labels, &SampleParams::default()),
            Err(Error::InvalidSample(_))
        ));
    }

    #[test]
    fn test_positive_without_class_fails() {
        let labels: FeatureCollection = vec![point(35.0, 75.0)].into_iter().collect();
        assert!(matches!(
            sample_regions(&composite(), &labels, &SampleParams::default()),
            Err(Error::InvalidSample(_))
        ));
    }
}
