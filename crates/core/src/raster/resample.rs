//! Nearest-neighbour resampling onto a reference grid

use crate::error::{Error, Result};
use crate::raster::Raster;

/// Resample `src` onto the grid of `template` by nearest neighbour.
///
/// Both rasters must declare equivalent coordinate systems; reprojection is
/// out of scope, so a CRS mismatch is an [`Error::Alignment`]. Template
/// pixels whose centers fall outside `src` become NaN.
pub fn resample_nearest<T: crate::raster::RasterElement>(
    src: &Raster<f64>,
    template: &Raster<T>,
) -> Result<Raster<f64>> {
    match (src.crs(), template.crs()) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => {
            return Err(Error::Alignment(format!(
                "cannot resample {} onto {} without reprojection",
                a, b
            )));
        }
        (Some(a), None) | (None, Some(a)) => {
            return Err(Error::Alignment(format!("CRS {} vs unspecified", a)));
        }
        _ => {}
    }

    if src.shape() == template.shape()
        && src.transform().same_grid(template.transform(), 1e-6)
    {
        let mut same = src.clone();
        same.set_crs(template.crs().cloned());
        return Ok(same);
    }

    let (rows, cols) = template.shape();
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = template.pixel_to_geo(col, row);
            let value = match src.locate(x, y) {
                Some((r, c)) => unsafe { src.get_unchecked(r, c) },
                None => f64::NAN,
            };
            data.push(value);
        }
    }
    template.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::raster::GeoTransform;

    #[test]
    fn test_upsample_nearest() {
        let src = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2)
            .unwrap()
            .with_transform(GeoTransform::north_up(0.0, 20.0, 10.0))
            .with_crs(CRS::utm(30, true));
        let template: Raster<f64> = Raster::new(4, 4)
            .with_transform(GeoTransform::north_up(0.0, 20.0, 5.0))
            .with_crs(CRS::utm(30, true));

        let out = resample_nearest(&src, &template).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_eq!(out.get(1, 1).unwrap(), 1.0);
        assert_eq!(out.get(0, 3).unwrap(), 2.0);
        assert_eq!(out.get(3, 0).unwrap(), 3.0);
        assert_eq!(out.get(3, 3).unwrap(), 4.0);
        assert!(out.is_aligned_with(&template));
    }

    #[test]
    fn test_outside_is_nan_and_crs_mismatch_fails() {
        let src = Raster::filled(2, 2, 7.0)
            .with_transform(GeoTransform::north_up(0.0, 20.0, 10.0))
            .with_crs(CRS::utm(30, true));
        let shifted: Raster<f64> = Raster::new(2, 2)
            .with_transform(GeoTransform::north_up(10.0, 20.0, 10.0))
            .with_crs(CRS::utm(30, true));
        let out = resample_nearest(&src, &shifted).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 7.0);
        assert!(out.get(0, 1).unwrap().is_nan());

        let other = shifted.clone().with_crs(CRS::utm(31, true));
        assert!(matches!(resample_nearest(&src, &other), Err(Error::Alignment(_))));
    }
}
