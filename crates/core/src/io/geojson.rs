//! GeoJSON FeatureCollection reading/writing

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{GeoJson, JsonObject};
use std::path::Path;

/// Parse a GeoJSON document (FeatureCollection, Feature or bare Geometry)
pub fn feature_collection_from_str(text: &str) -> Result<FeatureCollection> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::Other(format!("GeoJSON parse error: {}", e)))?;

    let features = match parsed {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    features.into_iter().map(convert_in).collect()
}

fn convert_in(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(|g| {
            geo::Geometry::<f64>::try_from(g)
                .map_err(|e| Error::Other(format!("unsupported GeoJSON geometry: {}", e)))
        })
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let value = serde_json::from_value::<AttributeValue>(v).unwrap_or(AttributeValue::Null);
            (k, value)
        })
        .collect();

    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn convert_out(feature: &Feature) -> Result<geojson::Feature> {
    let mut properties = JsonObject::new();
    for (k, v) in &feature.properties {
        let value = serde_json::to_value(v).map_err(|e| Error::Other(e.to_string()))?;
        properties.insert(k.clone(), value);
    }

    Ok(geojson::Feature {
        bbox: None,
        geometry: feature
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: feature.id.clone().map(geojson::feature::Id::String),
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Serialize a collection as a GeoJSON FeatureCollection string
pub fn feature_collection_to_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(convert_out)
        .collect::<Result<Vec<_>>>()?;
    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    Ok(GeoJson::FeatureCollection(fc).to_string())
}

/// Read a GeoJSON file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    feature_collection_from_str(&text)
}

/// Write a collection to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    std::fs::write(path.as_ref(), feature_collection_to_string(collection)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, polygon};

    #[test]
    fn test_parse_labels_with_mixed_class_attributes() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
                 "properties": {"class": 1}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [30.0, 40.0]},
                 "properties": {}}
            ]
        }"#;
        let fc = feature_collection_from_str(text).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].get_property("class"), Some(&AttributeValue::Int(1)));
        assert!(fc.features[1].get_property("class").is_none());
        assert_eq!(
            fc.features[0].geometry,
            Some(geo::Geometry::Point(Point::new(10.0, 20.0)))
        );
    }

    #[test]
    fn test_file_keeps_polygon_and_properties() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 0.0)];
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(poly).with_property("run_id", "it1").with_property("area_m2", 8.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.geojson");
        write_geojson(&fc, &path).unwrap();
        let back = read_geojson(&path).unwrap();

        assert_eq!(back, fc);
    }

    #[test]
    fn test_invalid_document() {
        assert!(feature_collection_from_str("{\"type\": \"Nope\"}").is_err());
    }
}
