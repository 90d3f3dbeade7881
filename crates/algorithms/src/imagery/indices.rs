//! Spectral indices appended to the optical composite

use moundscan_core::raster::Raster;
use moundscan_core::Result;

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in the range [-1, 1]. Pixels where the sum is zero or either
/// band is NaN are set to NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    let mut out = band_a.zip_map(band_b, |a, b| {
        let sum = a + b;
        if a.is_nan() || b.is_nan() || sum.abs() < 1e-10 {
            f64::NAN
        } else {
            (a - b) / sum
        }
    })?;
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`, with NIR = B8 and Red = B4 for the
/// multispectral instrument.
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moundscan_core::Error;

    #[test]
    fn test_ndvi_values() {
        let nir = Raster::from_vec(vec![0.5, 0.0, f64::NAN, 0.3], 2, 2).unwrap();
        let red = Raster::from_vec(vec![0.1, 0.0, 0.2, 0.3], 2, 2).unwrap();
        let out = ndvi(&nir, &red).unwrap();
        assert!((out.get(0, 0).unwrap() - 0.4 / 0.6).abs() < 1e-12);
        assert!(out.get(0, 1).unwrap().is_nan());
        assert!(out.get(1, 0).unwrap().is_nan());
        assert_eq!(out.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_misaligned_bands() {
        let a: Raster<f64> = Raster::new(2, 2);
        let b: Raster<f64> = Raster::new(3, 2);
        assert!(matches!(ndvi(&a, &b), Err(Error::Alignment(_))));
    }
}
