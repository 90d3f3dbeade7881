//! Focal (moving window) statistics
//!
//! Computes statistics within a moving window centered on each cell.
//! Supports: Mean, Median, Majority, Min, Max, Sum, Count.
//!
//! Window edges follow an explicit [`EdgePolicy`]: either a cell whose window
//! is incomplete is masked (NaN), or the statistic is knowingly computed from
//! the valid part of the window.

use crate::maybe_rayon::*;
use moundscan_core::raster::{Neighborhood, Raster, Window};
use moundscan_core::{Error, Result};

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocalStatistic {
    /// Arithmetic mean
    Mean,
    /// Median value (mean of the two middle values for even counts)
    Median,
    /// Most frequent value (ties resolve to the smallest value)
    Majority,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Sum of values
    Sum,
    /// Count of valid (non-NaN) values
    Count,
}

/// Window shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowShape {
    #[default]
    Square,
    Circle,
}

/// What to do with cells whose window is incomplete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// Window leaves the raster or covers a NaN cell: output NaN
    #[default]
    Mask,
    /// Compute from the valid cells that the window does cover
    Truncate,
}

/// Parameters for focal statistics
#[derive(Debug, Clone)]
pub struct FocalParams {
    /// Window radius in cells (square window size = 2*radius + 1)
    pub radius: usize,
    /// Statistic to compute
    pub statistic: FocalStatistic,
    /// Square or circular window
    pub shape: WindowShape,
    /// Edge handling
    pub edge: EdgePolicy,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            radius: 1,
            statistic: FocalStatistic::Mean,
            shape: WindowShape::Square,
            edge: EdgePolicy::Mask,
        }
    }
}

impl FocalParams {
    fn window(&self) -> Window {
        match self.shape {
            WindowShape::Square => Neighborhood::Square(self.radius).window(),
            WindowShape::Circle => Neighborhood::Circle(self.radius).window(),
        }
    }
}

/// Compute focal statistics on a raster
///
/// # Arguments
/// * `raster` - Input raster (NaN marks invalid cells)
/// * `params` - Focal parameters (radius, statistic, shape, edge policy)
///
/// # Returns
/// Raster with the computed statistic at each cell
pub fn focal_statistics(raster: &Raster<f64>, params: FocalParams) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::Algorithm("Focal radius must be > 0".into()));
    }

    let window = params.window();
    if params.statistic == FocalStatistic::Mean {
        return focal_mean(raster, &window, params.edge);
    }

    let (rows, cols) = raster.shape();
    let offsets = window.offsets();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values: Vec<f64> = Vec::with_capacity(offsets.len());

            for (col, out) in row_data.iter_mut().enumerate() {
                let complete = window.fits(row, col, rows, cols);
                if params.edge == EdgePolicy::Mask && !complete {
                    continue;
                }

                values.clear();
                let mut partial = false;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                    if v.is_nan() {
                        partial = true;
                    } else {
                        values.push(v);
                    }
                }

                if values.is_empty() || (partial && params.edge == EdgePolicy::Mask) {
                    continue;
                }

                *out = compute_statistic(&mut values, params.statistic);
            }

            row_data
        })
        .collect();

    raster.derive(output_data, Some(f64::NAN))
}

/// Circular focal mean for a radius in ground units, masking incomplete windows.
///
/// Cells within `radius` (center to center) of the target cell, the target
/// included, form the window. A cell gets NaN when its window leaves the
/// raster or covers any NaN.
pub fn focal_mean_metric(raster: &Raster<f64>, radius: f64) -> Result<Raster<f64>> {
    let window = Window::circle_ground(radius, raster.cell_size())?;
    focal_mean(raster, &window, EdgePolicy::Mask)
}

/// Windowed mean using per-row prefix sums over the window's row spans
pub fn focal_mean(raster: &Raster<f64>, window: &Window, edge: EdgePolicy) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let prefix = RowPrefix::new(raster);
    let spans = window.spans();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let complete = window.fits(row, col, rows, cols);
                if edge == EdgePolicy::Mask && !complete {
                    continue;
                }

                let mut sum = 0.0;
                let mut count = 0usize;
                let mut covered = 0usize;
                for &(dr, half) in spans {
                    let nr = row as isize + dr;
                    if nr < 0 || nr as usize >= rows {
                        continue;
                    }
                    let c0 = col.saturating_sub(half);
                    let c1 = (col + half + 1).min(cols);
                    let (s, n) = prefix.range(nr as usize, c0, c1);
                    sum += s;
                    count += n;
                    covered += c1 - c0;
                }

                if count == 0 || (edge == EdgePolicy::Mask && count != covered) {
                    continue;
                }
                *out = sum / count as f64;
            }

            row_data
        })
        .collect();

    raster.derive(output_data, Some(f64::NAN))
}

/// Per-row cumulative sums of valid values and valid-cell counts
struct RowPrefix {
    cols: usize,
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl RowPrefix {
    fn new(raster: &Raster<f64>) -> Self {
        let (rows, cols) = raster.shape();
        let stride = cols + 1;
        let mut sums = vec![0.0; rows * stride];
        let mut counts = vec![0u32; rows * stride];

        for row in 0..rows {
            let base = row * stride;
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                let (s, n) = if v.is_nan() { (0.0, 0) } else { (v, 1) };
                sums[base + col + 1] = sums[base + col] + s;
                counts[base + col + 1] = counts[base + col] + n;
            }
        }

        Self { cols, sums, counts }
    }

    /// (sum, valid count) over columns `c0..c1` of `row`
    fn range(&self, row: usize, c0: usize, c1: usize) -> (f64, usize) {
        let base = row * (self.cols + 1);
        (
            self.sums[base + c1] - self.sums[base + c0],
            (self.counts[base + c1] - self.counts[base + c0]) as usize,
        )
    }
}

fn compute_statistic(values: &mut [f64], stat: FocalStatistic) -> f64 {
    let n = values.len() as f64;

    match stat {
        FocalStatistic::Mean => values.iter().sum::<f64>() / n,
        FocalStatistic::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        FocalStatistic::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        FocalStatistic::Sum => values.iter().sum::<f64>(),
        FocalStatistic::Count => n,
        FocalStatistic::Median => {
            values.sort_by(|a, b| a.total_cmp(b));
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            }
        }
        FocalStatistic::Majority => {
            values.sort_by(|a, b| a.total_cmp(b));
            let mut best = values[0];
            let mut best_run = 0usize;
            let mut i = 0;
            while i < values.len() {
                let mut j = i;
                while j < values.len() && values[j] == values[i] {
                    j += 1;
                }
                if j - i > best_run {
                    best_run = j - i;
                    best = values[i];
                }
                i = j;
            }
            best
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moundscan_core::GeoTransform;

    fn uniform_raster(size: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(size, size, value);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        r
    }

    fn gradient_raster(size: usize) -> Raster<f64> {
        let mut r = Raster::new(size, size);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        for row in 0..size {
            for col in 0..size {
                r.set(row, col, (row * size + col) as f64).unwrap();
            }
        }
        r
    }

    fn params(radius: usize, statistic: FocalStatistic) -> FocalParams {
        FocalParams {
            radius,
            statistic,
            ..Default::default()
        }
    }

    #[test]
    fn test_focal_mean_uniform() {
        let r = uniform_raster(10, 5.0);
        let result = focal_statistics(&r, params(1, FocalStatistic::Mean)).unwrap();
        let v = result.get(5, 5).unwrap();
        assert!((v - 5.0).abs() < 1e-10, "Mean of uniform should be 5.0, got {}", v);
    }

    #[test]
    fn test_mask_policy_leaves_edges_invalid() {
        let r = uniform_raster(10, 5.0);
        let result = focal_statistics(&r, params(2, FocalStatistic::Max)).unwrap();
        assert!(result.get(1, 5).unwrap().is_nan());
        assert!(result.get(5, 8).unwrap().is_nan());
        assert_eq!(result.get(2, 2).unwrap(), 5.0);

        let mut holed = r.clone();
        holed.set(4, 4, f64::NAN).unwrap();
        let mean = focal_statistics(&holed, params(1, FocalStatistic::Mean)).unwrap();
        assert!(mean.get(5, 5).unwrap().is_nan());
        assert!(!mean.get(6, 6).unwrap().is_nan());
    }

    #[test]
    fn test_truncate_policy_uses_valid_cells() {
        let r = uniform_raster(10, 1.0);
        let result = focal_statistics(
            &r,
            FocalParams {
                radius: 1,
                statistic: FocalStatistic::Count,
                edge: EdgePolicy::Truncate,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 4.0);
        assert_eq!(result.get(0, 5).unwrap(), 6.0);
        assert_eq!(result.get(5, 5).unwrap(), 9.0);
    }

    #[test]
    fn test_focal_min_max() {
        let r = gradient_raster(10);
        let min_v = focal_statistics(&r, params(1, FocalStatistic::Min)).unwrap().get(5, 5).unwrap();
        let max_v = focal_statistics(&r, params(1, FocalStatistic::Max)).unwrap().get(5, 5).unwrap();
        // Cell (5,5) = 55, neighbors span (4,4)=44 to (6,6)=66
        assert!((min_v - 44.0).abs() < 1e-10);
        assert!((max_v - 66.0).abs() < 1e-10);
    }

    #[test]
    fn test_focal_median_and_sum() {
        let r = gradient_raster(10);
        let v = focal_statistics(&r, params(1, FocalStatistic::Median)).unwrap().get(5, 5).unwrap();
        assert!((v - 55.0).abs() < 1e-10, "Median should be 55, got {}", v);

        let ones = uniform_raster(10, 1.0);
        let s = focal_statistics(&ones, params(1, FocalStatistic::Sum)).unwrap().get(5, 5).unwrap();
        assert!((s - 9.0).abs() < 1e-10, "Sum should be 9, got {}", s);
    }

    #[test]
    fn test_majority_ties_to_smallest() {
        let mut values = vec![1.0, 0.0, 1.0, 0.0, 2.0];
        assert_eq!(compute_statistic(&mut values, FocalStatistic::Majority), 0.0);
        let mut values = vec![1.0, 1.0, 0.0];
        assert_eq!(compute_statistic(&mut values, FocalStatistic::Majority), 1.0);
    }

    #[test]
    fn test_focal_circular() {
        let r = uniform_raster(10, 1.0);
        let result = focal_statistics(
            &r,
            FocalParams {
                radius: 2,
                statistic: FocalStatistic::Count,
                shape: WindowShape::Circle,
                edge: EdgePolicy::Mask,
            },
        )
        .unwrap();
        // dr² + dc² <= 4 gives 13 cells
        let v = result.get(5, 5).unwrap();
        assert!((v - 13.0).abs() < 1e-10, "Circular r=2 should have 13 cells, got {}", v);
    }

    #[test]
    fn test_prefix_mean_matches_direct_mean() {
        let r = gradient_raster(15);
        let window = Window::disk(3.0);
        let fast = focal_mean(&r, &window, EdgePolicy::Truncate).unwrap();
        let offsets = window.offsets();
        for (row, col) in [(0, 0), (7, 7), (14, 3), (2, 13)] {
            let vals: Vec<f64> = offsets
                .iter()
                .filter_map(|&(dr, dc)| {
                    let (nr, nc) = (row as isize + dr, col as isize + dc);
                    (nr >= 0 && nc >= 0 && nr < 15 && nc < 15)
                        .then(|| r.get(nr as usize, nc as usize).unwrap())
                })
                .collect();
            let direct = vals.iter().sum::<f64>() / vals.len() as f64;
            assert!((fast.get(row, col).unwrap() - direct).abs() < 1e-9);
        }
    }

    #[test]
    fn test_metric_radius_uses_cell_size() {
        let mut r = uniform_raster(20, 3.0);
        r.set_transform(GeoTransform::north_up(0.0, 40.0, 2.0));
        // 6 m at 2 m cells = 3 cell radius
        let out = focal_mean_metric(&r, 6.0).unwrap();
        assert!(out.get(2, 10).unwrap().is_nan());
        assert_eq!(out.get(3, 10).unwrap(), 3.0);
        assert!(focal_mean_metric(&r, -1.0).is_err());
    }

    #[test]
    fn test_focal_radius_zero_error() {
        let r = uniform_raster(5, 1.0);
        assert!(focal_statistics(&r, params(0, FocalStatistic::Mean)).is_err());
    }
}
