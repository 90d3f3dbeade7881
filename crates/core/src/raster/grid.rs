//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// Relative tolerance (fraction of a cell) used when comparing grids
const GRID_TOLERANCE: f64 = 1e-6;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS). Derived layers are always new
/// rasters built with [`Raster::with_same_meta`] or [`Raster::map`], so a
/// raster handed to a scoring step is never mutated behind its back.
///
/// # Example
///
/// ```ignore
/// use moundscan_core::{GeoTransform, Raster};
///
/// let mut dem: Raster<f64> = Raster::filled(100, 100, 250.0);
/// dem.set_transform(GeoTransform::north_up(500_000.0, 4_330_000.0, 2.0));
/// dem.set(10, 20, 251.5)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zero raster of another element type on the same grid
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Build a raster on this raster's grid from row-major data
    pub fn derive<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut output = self.with_same_meta::<U>(rows, cols);
        output.nodata = nodata;
        output.data = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(output)
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style CRS setter
    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size in ground units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Pixel (row, col) containing the map coordinate, if inside the raster
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    // Grid alignment

    /// Whether `other` lies on exactly the same grid (shape, transform, CRS)
    pub fn is_aligned_with<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.check_alignment(other).is_ok()
    }

    /// Fail with [`Error::Alignment`] unless `other` shares this raster's grid
    pub fn check_alignment<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::Alignment(format!(
                "shape {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        if !self.transform.same_grid(&other.transform, GRID_TOLERANCE) {
            return Err(Error::Alignment(format!(
                "grid origin/resolution ({}, {}, {}) vs ({}, {}, {})",
                self.transform.origin_x,
                self.transform.origin_y,
                self.transform.pixel_width,
                other.transform.origin_x,
                other.transform.origin_y,
                other.transform.pixel_width,
            )));
        }
        match (&self.crs, &other.crs) {
            (Some(a), Some(b)) if !a.is_equivalent(b) => {
                Err(Error::Alignment(format!("CRS {} vs {}", a, b)))
            }
            (Some(a), None) | (None, Some(a)) => Err(Error::Alignment(format!(
                "CRS {} vs unspecified",
                a
            ))),
            _ => Ok(()),
        }
    }

    // Cell-wise algebra

    /// Apply `f` to every cell, producing a new raster on the same grid
    pub fn map<U, F>(&self, f: F) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U,
    {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Combine two aligned rasters cell by cell
    pub fn zip_map<U, V, F>(&self, other: &Raster<U>, f: F) -> Result<Raster<V>>
    where
        U: RasterElement,
        V: RasterElement,
        F: Fn(T, U) -> V,
    {
        self.check_alignment(other)?;
        let data: Vec<V> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        self.derive(data, None)
    }

    /// Copy a rectangular window into a new raster with an adjusted transform
    pub fn window(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> Result<Raster<T>> {
        if rows == 0 || cols == 0 || row0 + rows > self.rows() || col0 + cols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row0 + rows,
                col: col0 + cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let data = self
            .data
            .slice(ndarray::s![row0..row0 + rows, col0..col0 + cols])
            .to_owned();
        Ok(Raster {
            data,
            transform: self.transform.offset(col0, row0),
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    // Statistics

    /// Basic statistics over valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            if min.is_none_or(|m| value < m) {
                min = Some(value);
            }
            if max.is_none_or(|m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize) -> Raster<f64> {
        Raster::filled(rows, cols, 1.0)
            .with_transform(GeoTransform::north_up(0.0, rows as f64 * 10.0, 10.0))
            .with_crs(CRS::utm(16, true))
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_statistics_skip_nan() {
        let mut raster = Raster::filled(4, 4, 2.0);
        raster.set(0, 0, f64::NAN).unwrap();
        raster.set(3, 3, 8.0).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.valid_count, 15);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_alignment_detects_resolution_and_crs() {
        let a = grid(8, 8);
        assert!(a.is_aligned_with(&grid(8, 8)));

        let coarse = grid(8, 8).with_transform(GeoTransform::north_up(0.0, 80.0, 20.0));
        assert!(matches!(a.check_alignment(&coarse), Err(Error::Alignment(_))));

        let other_crs = grid(8, 8).with_crs(CRS::utm(17, true));
        assert!(matches!(a.check_alignment(&other_crs), Err(Error::Alignment(_))));

        assert!(matches!(a.check_alignment(&grid(8, 9)), Err(Error::Alignment(_))));
    }

    #[test]
    fn test_zip_map_and_window() {
        let a = grid(6, 6);
        let b = a.map(|v| v * 3.0);
        let sum = a.zip_map(&b, |x, y| x + y).unwrap();
        assert_eq!(sum.get(2, 2).unwrap(), 4.0);

        let w = sum.window(2, 3, 2, 2).unwrap();
        assert_eq!(w.shape(), (2, 2));
        assert_eq!(w.transform().origin_x, 30.0);
        assert_eq!(w.transform().origin_y, 40.0);
        assert!(sum.window(5, 5, 2, 2).is_err());
    }

    #[test]
    fn test_locate() {
        let r = grid(5, 5);
        assert_eq!(r.locate(15.0, 45.0), Some((0, 1)));
        assert_eq!(r.locate(-1.0, 45.0), None);
        assert_eq!(r.locate(15.0, 51.0), None);
    }
}
