//! Analysis regions

use geo::{Area, BoundingRect, Contains, Coord, LineString, Point, Polygon};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandStack, GeoTransform, Raster};

/// The spatial extent of one detection run, in the map units of the rasters.
///
/// A region is immutable once built; every raster entering a run is clipped
/// to it with [`Region::clip`].
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Arbitrary polygon (exterior ring, optional holes)
    Polygon(Polygon<f64>),
    /// Disk of `radius` around `center`
    Buffer { center: Coord<f64>, radius: f64 },
}

impl Region {
    /// Polygon region from an exterior ring; the ring is closed if needed
    pub fn polygon(ring: Vec<(f64, f64)>) -> Result<Self> {
        if ring.len() < 3 {
            return Err(Error::invalid_param(
                "region",
                format!("{} vertices", ring.len()),
                "polygon needs at least 3 vertices",
            ));
        }
        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::invalid_param("region", "non-finite vertex", "coordinates must be finite"));
        }
        let polygon = Polygon::new(LineString::from(ring), vec![]);
        if polygon.unsigned_area() <= 0.0 {
            return Err(Error::invalid_param("region", "zero area", "polygon is degenerate"));
        }
        Ok(Region::Polygon(polygon))
    }

    /// Circular buffer around a center point
    pub fn buffer(center: (f64, f64), radius: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(Error::invalid_param("radius", radius, "must be positive"));
        }
        Ok(Region::Buffer {
            center: Coord { x: center.0, y: center.1 },
            radius,
        })
    }

    /// Region covering a raster's full extent
    pub fn from_raster<T: crate::raster::RasterElement>(raster: &Raster<T>) -> Self {
        let (min_x, min_y, max_x, max_y) = raster.bounds();
        Region::Polygon(Polygon::new(
            LineString::from(vec![(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)]),
            vec![],
        ))
    }

    /// Bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        match self {
            Region::Polygon(p) => p
                .bounding_rect()
                .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
                .unwrap_or((f64::NAN, f64::NAN, f64::NAN, f64::NAN)),
            Region::Buffer { center, radius } => (
                center.x - radius,
                center.y - radius,
                center.x + radius,
                center.y + radius,
            ),
        }
    }

    /// Whether a map coordinate lies inside the region
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Region::Polygon(p) => p.contains(&Point::new(x, y)),
            Region::Buffer { center, radius } => (x - center.x).hypot(y - center.y) <= *radius,
        }
    }

    /// Ground area of the region
    pub fn area(&self) -> f64 {
        match self {
            Region::Polygon(p) => p.unsigned_area(),
            Region::Buffer { radius, .. } => std::f64::consts::PI * radius * radius,
        }
    }

    /// Polygon approximation (buffers become a `segments`-gon)
    pub fn to_polygon(&self, segments: usize) -> Polygon<f64> {
        match self {
            Region::Polygon(p) => p.clone(),
            Region::Buffer { center, radius } => {
                let n = segments.max(8);
                let ring: Vec<(f64, f64)> = (0..n)
                    .map(|i| {
                        let a = std::f64::consts::TAU * i as f64 / n as f64;
                        (center.x + radius * a.cos(), center.y + radius * a.sin())
                    })
                    .collect();
                Polygon::new(LineString::from(ring), vec![])
            }
        }
    }

    /// Crop `raster` to the region's bounding window and set pixels whose
    /// centers fall outside the region to NaN.
    ///
    /// Fails with [`Error::NoData`] when no pixel center lies in the region.
    pub fn clip(&self, raster: &Raster<f64>) -> Result<Raster<f64>> {
        let (row0, col0, rows, cols) = self.pixel_window(raster)?;
        let mut out = raster.window(row0, col0, rows, cols)?;
        out.set_nodata(Some(f64::NAN));

        let mut inside = 0usize;
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = out.pixel_to_geo(col, row);
                if self.contains(x, y) {
                    inside += 1;
                } else {
                    out.data_mut()[(row, col)] = f64::NAN;
                }
            }
        }
        if inside == 0 {
            return Err(Error::NoData("region contains no raster pixel centers".into()));
        }
        Ok(out)
    }

    /// Whether any pixel center of `raster` falls inside the region
    pub fn intersects<T: crate::raster::RasterElement>(&self, raster: &Raster<T>) -> bool {
        let Ok((row0, col0, rows, cols)) = self.pixel_window(raster) else {
            return false;
        };
        (row0..row0 + rows).any(|row| {
            (col0..col0 + cols).any(|col| {
                let (x, y) = raster.pixel_to_geo(col, row);
                self.contains(x, y)
            })
        })
    }

    /// Set pixels whose centers fall outside the region to NaN, keeping the grid
    pub fn mask(&self, raster: &Raster<f64>) -> Result<Raster<f64>> {
        let (rows, cols) = raster.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = raster.pixel_to_geo(col, row);
                let v = unsafe { raster.get_unchecked(row, col) };
                data.push(if self.contains(x, y) { v } else { f64::NAN });
            }
        }
        raster.derive(data, Some(f64::NAN))
    }

    /// Zero-filled grid of `cell_size` covering the region bounds, snapped to
    /// multiples of the cell size, with NaN outside the region
    pub fn grid(&self, cell_size: f64, crs: Option<CRS>) -> Result<Raster<f64>> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(Error::invalid_param("cell_size", cell_size, "must be positive"));
        }
        let (min_x, min_y, max_x, max_y) = self.bounds();
        let origin_x = (min_x / cell_size).floor() * cell_size;
        let origin_y = (max_y / cell_size).ceil() * cell_size;
        let cols = ((max_x - origin_x) / cell_size).ceil().max(1.0) as usize;
        let rows = ((origin_y - min_y) / cell_size).ceil().max(1.0) as usize;

        let mut grid = Raster::filled(rows, cols, 0.0)
            .with_transform(GeoTransform::north_up(origin_x, origin_y, cell_size));
        grid.set_crs(crs);
        self.mask(&grid)
    }

    /// Clip every band of a stack
    pub fn clip_stack(&self, stack: &BandStack) -> Result<BandStack> {
        stack.map_bands(|band| self.clip(band))
    }

    /// Pixel window (row0, col0, rows, cols) of `raster` covering the region bounds
    fn pixel_window<T: crate::raster::RasterElement>(
        &self,
        raster: &Raster<T>,
    ) -> Result<(usize, usize, usize, usize)> {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        let t = raster.transform();
        let corners = [
            t.geo_to_pixel(min_x, min_y),
            t.geo_to_pixel(max_x, min_y),
            t.geo_to_pixel(min_x, max_y),
            t.geo_to_pixel(max_x, max_y),
        ];
        let c_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor();
        let c_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil();
        let r_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor();
        let r_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil();

        let col0 = c_min.max(0.0);
        let row0 = r_min.max(0.0);
        let col1 = c_max.min(raster.cols() as f64);
        let row1 = r_max.min(raster.rows() as f64);
        if !(col1 > col0 && row1 > row0) {
            return Err(Error::NoData("region does not intersect the raster extent".into()));
        }
        Ok((
            row0 as usize,
            col0 as usize,
            (row1 - row0) as usize,
            (col1 - col0) as usize,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raster() -> Raster<f64> {
        Raster::filled(10, 10, 5.0).with_transform(GeoTransform::north_up(0.0, 100.0, 10.0))
    }

    #[test]
    fn test_buffer_clip_masks_corners() {
        let region = Region::buffer((50.0, 50.0), 20.0).unwrap();
        let clipped = region.clip(&raster()).unwrap();
        assert_eq!(clipped.shape(), (4, 4));
        // corner pixel center (35, 65) is ~21.2 m away
        assert!(clipped.get(0, 0).unwrap().is_nan());
        assert_eq!(clipped.get(1, 1).unwrap(), 5.0);
        assert_relative_eq!(clipped.transform().origin_x, 30.0);
        assert_relative_eq!(clipped.transform().origin_y, 70.0);
    }

    #[test]
    fn test_polygon_region() {
        let region =
            Region::polygon(vec![(0.0, 0.0), (30.0, 0.0), (30.0, 30.0), (0.0, 30.0)]).unwrap();
        assert!(region.contains(15.0, 15.0));
        assert!(!region.contains(45.0, 15.0));
        assert!(region.intersects(&raster()));
        assert_relative_eq!(region.area(), 900.0);
        let clipped = region.clip(&raster()).unwrap();
        assert_eq!(clipped.shape(), (3, 3));
        assert!(clipped.data().iter().all(|v| *v == 5.0));
    }

    #[test]
    fn test_grid_snaps_to_cells() {
        let region = Region::buffer((503.0, 1007.0), 20.0).unwrap();
        let grid = region.grid(10.0, Some(CRS::utm(18, true))).unwrap();
        assert_relative_eq!(grid.transform().origin_x, 480.0);
        assert_relative_eq!(grid.transform().origin_y, 1030.0);
        assert_eq!(grid.shape(), (5, 5));
        assert_eq!(grid.get(2, 2).unwrap(), 0.0);
        assert!(grid.get(0, 0).unwrap().is_nan());
        assert!(region.grid(0.0, None).is_err());
    }

    #[test]
    fn test_disjoint_region_is_no_data() {
        let region = Region::buffer((500.0, 500.0), 20.0).unwrap();
        assert!(!region.intersects(&raster()));
        assert!(matches!(region.clip(&raster()), Err(Error::NoData(_))));
        assert!(Region::buffer((0.0, 0.0), 0.0).is_err());
        assert!(Region::polygon(vec![(0.0, 0.0), (1.0, 1.0)]).is_err());
    }
}
