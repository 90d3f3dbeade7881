//! Per-pixel reductions over a time series of aligned rasters

use crate::maybe_rayon::*;
use moundscan_core::raster::Raster;
use moundscan_core::{Error, Result};

/// Temporal reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Median of valid observations (mean of the two middle values for even counts)
    Median,
    /// Mean of valid observations
    Mean,
}

/// Reduce a stack of aligned rasters pixel by pixel, ignoring NaN observations.
///
/// A pixel with no valid observation is NaN.
pub fn temporal_reduce(series: &[Raster<f64>], reducer: Reducer) -> Result<Raster<f64>> {
    let first = series
        .first()
        .ok_or_else(|| Error::NoData("empty time series".into()))?;
    for r in &series[1..] {
        first.check_alignment(r)?;
    }

    let (rows, cols) = first.shape();
    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values: Vec<f64> = Vec::with_capacity(series.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();
                values.extend(
                    series
                        .iter()
                        .map(|r| unsafe { r.get_unchecked(row, col) })
                        .filter(|v| !v.is_nan()),
                );
                if values.is_empty() {
                    continue;
                }
                *out = match reducer {
                    Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    Reducer::Median => {
                        values.sort_by(|a, b| a.total_cmp(b));
                        let mid = values.len() / 2;
                        if values.len() % 2 == 0 {
                            (values[mid - 1] + values[mid]) / 2.0
                        } else {
                            values[mid]
                        }
                    }
                };
            }
            row_data
        })
        .collect();

    first.derive(output_data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(v: f64) -> Raster<f64> {
        Raster::filled(2, 2, v)
    }

    #[test]
    fn test_median_and_mean_skip_nan() {
        let mut gap = r(100.0);
        gap.set(0, 0, f64::NAN).unwrap();
        let series = vec![r(1.0), r(3.0), gap, r(2.0)];

        let med = temporal_reduce(&series, Reducer::Median).unwrap();
        assert_eq!(med.get(0, 0).unwrap(), 2.0);
        assert_eq!(med.get(1, 1).unwrap(), 2.5);

        let mean = temporal_reduce(&series, Reducer::Mean).unwrap();
        assert_eq!(mean.get(0, 0).unwrap(), 2.0);
        assert_eq!(mean.get(1, 1).unwrap(), 26.5);
    }

    #[test]
    fn test_all_missing_and_empty() {
        let series = vec![r(f64::NAN), r(f64::NAN)];
        assert!(temporal_reduce(&series, Reducer::Mean).unwrap().get(0, 1).unwrap().is_nan());
        assert!(matches!(temporal_reduce(&[], Reducer::Median), Err(Error::NoData(_))));
    }
}
