//! GeoTIFF and GeoJSON I/O used by file-backed sources and export sinks

mod geojson;
mod geotiff;

pub use self::geojson::{
    feature_collection_from_str, feature_collection_to_string, read_geojson, write_geojson,
};
pub use self::geotiff::{
    read_band, read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
};
