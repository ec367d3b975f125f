// src/data_analysis/decimate.rs

use std::sync::Arc;

use ndarray::{s, Array1};
use ndarray_stats::QuantileExt;

use crate::signal_table::SignalSeries;

/// Min/max-preserving down-sampling.
///
/// The series is split into `max_points / 2` contiguous buckets and each
/// bucket contributes its minimum and maximum sample, emitted in index order.
/// Spikes therefore survive and the global extremes are always kept. A series
/// already within budget is copied unchanged. The source is never mutated.
pub fn decimate(series: &SignalSeries, max_points: usize) -> SignalSeries {
    let n = series.len();
    let indices: Vec<usize> = if n <= max_points {
        (0..n).collect()
    } else if max_points == 0 {
        Vec::new()
    } else if max_points == 1 {
        series
            .values
            .mapv(f64::abs)
            .argmax_skipnan()
            .map(|i| vec![i])
            .unwrap_or_else(|_| vec![0])
    } else {
        bucket_extremes(&series.values, max_points / 2)
    };

    let time = Array1::from_iter(indices.iter().map(|&i| series.time[i]));
    let values = Array1::from_iter(indices.iter().map(|&i| series.values[i]));
    SignalSeries { key: series.key, time: Arc::new(time), values }
}

fn bucket_extremes(values: &Array1<f64>, buckets: usize) -> Vec<usize> {
    let n = values.len();
    let mut indices = Vec::with_capacity(buckets * 2);
    for b in 0..buckets {
        let start = b * n / buckets;
        let end = (b + 1) * n / buckets;
        if start >= end {
            continue;
        }
        let bucket = values.slice(s![start..end]);
        // NaN samples are skipped; an all-NaN bucket keeps its first sample.
        let lo = bucket.argmin_skipnan().unwrap_or(0) + start;
        let hi = bucket.argmax_skipnan().unwrap_or(0) + start;
        if lo == hi {
            indices.push(lo);
        } else {
            indices.push(lo.min(hi));
            indices.push(lo.max(hi));
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis_names::Axis;
    use crate::signal_table::SignalKey;

    fn series(values: Vec<f64>) -> SignalSeries {
        let time = Arc::new(Array1::from_shape_fn(values.len(), |i| i as f64 * 0.001));
        SignalSeries::new(SignalKey::gyro_filtered(Axis::Roll), time, Array1::from(values)).unwrap()
    }

    #[test]
    fn test_short_series_is_copied() {
        let s = series(vec![1.0, 2.0, 3.0]);
        let d = decimate(&s, 10);
        assert_eq!(d.values, s.values);
        assert_eq!(d.time.as_ref(), s.time.as_ref());
    }

    #[test]
    fn test_spike_survives() {
        let mut values = vec![0.0; 10_000];
        values[4321] = 900.0;
        values[8765] = -700.0;
        let d = decimate(&series(values), 100);
        assert!(d.len() <= 100);
        assert!(d.values.iter().any(|&v| v == 900.0));
        assert!(d.values.iter().any(|&v| v == -700.0));
        assert!(d.time.windows(2).into_iter().all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_spike_survives_next_to_nan() {
        let mut values = vec![0.0; 10_000];
        values[4320] = f64::NAN;
        values[4321] = 900.0;
        values[4322] = -650.0;
        let d = decimate(&series(values), 100);
        assert!(d.values.iter().any(|&v| v == 900.0));
        assert!(d.values.iter().any(|&v| v == -650.0));
        assert!(d.values.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_all_nan_bucket_keeps_one_sample() {
        let mut values = vec![1.0; 400];
        values[..100].iter_mut().for_each(|v| *v = f64::NAN);
        let d = decimate(&series(values), 8);
        assert_eq!(d.len(), 4);
        assert!(d.values[0].is_nan());
    }

    #[test]
    fn test_degenerate_budgets() {
        let s = series(vec![1.0, -5.0, 3.0]);
        assert!(decimate(&s, 0).is_empty());
        let one = decimate(&s, 1);
        assert_eq!(one.values.to_vec(), vec![-5.0]);
    }

    #[test]
    fn test_is_pure() {
        let s = series((0..5000).map(|i| ((i * 37) % 101) as f64).collect());
        let before = s.clone();
        let a = decimate(&s, 300);
        let b = decimate(&s, 300);
        assert_eq!(a, b);
        assert_eq!(s, before);
    }
}
