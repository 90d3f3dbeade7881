//! Single-band GeoTIFF reading/writing with the `tiff` crate
//!
//! Georeferencing is carried by ModelPixelScale/ModelTiepoint tags, the CRS by
//! an EPSG code in the GeoKey directory and no-data by the GDAL_NODATA tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray32Float;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Read the first band of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode(file)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode(Cursor::new(data))
}

/// Read a GeoTIFF as `f64`, converting the declared no-data value to NaN
pub fn read_band<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let mut raster: Raster<f64> = read_geotiff(path)?;
    if let Some(nd) = raster.nodata().filter(|v| !v.is_nan()) {
        raster.data_mut().mapv_inplace(|v| if v == nd { f64::NAN } else { v });
    }
    raster.set_nodata(Some(f64::NAN));
    Ok(raster)
}

fn decode<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    let image = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
            .collect()
    }

    let data: Vec<T> = match image {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF pixel format".into())),
    };

    // Multi-sample images decode interleaved; keep only the first sample
    let samples = data.len() / (rows * cols).max(1);
    let data = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_transform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    if let Ok(text) = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        && let Ok(value) = text.trim_matches(char::from(0)).trim().parse::<f64>()
    {
        raster.set_nodata(num_traits::cast(value));
    }

    Ok(raster)
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)).ok()?;
    // Header is 4 shorts, then entries of (key, location, count, value)
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE || entry[0] == GEOGRAPHIC_TYPE)
                && entry[1] == 0
                && entry[3] != 0
                && entry[3] != 32767
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

/// Write a raster to a single-band 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a raster as an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(raster, &mut Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{}: {}", what, e));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 1, GT_RASTER_TYPE, 0, 1, 1];
    if let Some(code) = raster.crs().and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok()) {
        let geographic = raster.crs().is_some_and(|c| c.is_geographic());
        // GTModelType: 1 projected, 2 geographic
        geokeys[7] = if geographic { 2 } else { 1 };
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        geokeys.extend_from_slice(&[key, 0, 1, code]);
        geokeys[3] = 3;
    }
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), "nan")
        .map_err(|e| tiff_err("Cannot write nodata tag", e))?;

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_preserves_grid_and_crs() {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0], 2, 3)
            .unwrap()
            .with_transform(GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0))
            .with_crs(CRS::utm(33, true));
        raster.set_nodata(Some(f64::NAN));

        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.get(1, 2).unwrap(), 6.0);
        assert!(back.get(1, 0).unwrap().is_nan());
        assert_eq!(back.transform().origin_x, 500_000.0);
        assert_eq!(back.transform().pixel_height, -10.0);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32633));
    }

    #[test]
    fn test_file_mask_as_float() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");
        let mask: Raster<u8> = Raster::from_vec(vec![0, 1, 1, 0], 2, 2).unwrap();
        write_geotiff(&mask, &path).unwrap();

        let back = read_band(&path).unwrap();
        assert_eq!(back.get(0, 1).unwrap(), 1.0);
        assert_eq!(back.get(1, 1).unwrap(), 0.0);
    }
}
