// src/data_analysis/error_histogram.rs

//! Distribution of setpoint tracking error.
//!
//! Samples further than `outlier_sigma` standard deviations from the mean are
//! dropped per axis. All axes then share one histogram range, symmetric about
//! zero, so their shapes can be compared directly.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::axis_names::Axis;
use crate::config::ErrorHistogramConfig;
use crate::constants::DEFAULT_ERROR_RANGE;
use crate::data_analysis::derived_signals::tracking_error;
use crate::error::{AnalysisError, AnalysisResult};
use crate::signal_table::{SignalKey, SignalTable};

/// Tracking-error samples of one axis with outliers removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSamples {
    pub kept: Array1<f64>,
    pub outliers_removed: usize,
    /// Mean and population standard deviation before outlier removal.
    pub mean: f64,
    pub std_dev: f64,
}

/// Keeps samples within `sigma` population standard deviations of the mean.
pub fn remove_outliers(errors: &Array1<f64>, sigma: f64) -> ErrorSamples {
    let finite: Vec<f64> = errors.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return ErrorSamples {
            kept: Array1::zeros(0),
            outliers_removed: errors.len(),
            mean: 0.0,
            std_dev: 0.0,
        };
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let std_dev = (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let limit = sigma * std_dev;
    let kept: Array1<f64> = finite.into_iter().filter(|v| (v - mean).abs() <= limit).collect();
    ErrorSamples { outliers_removed: errors.len() - kept.len(), kept, mean, std_dev }
}

/// Range symmetric about zero covering every sample. Falls back to
/// `±DEFAULT_ERROR_RANGE` when there is nothing to cover.
pub fn symmetric_range<'a>(samples: impl IntoIterator<Item = &'a Array1<f64>>) -> (f64, f64) {
    let max_abs = samples
        .into_iter()
        .flat_map(|s| s.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()));
    if max_abs > 0.0 && max_abs.is_finite() {
        (-max_abs, max_abs)
    } else {
        (-DEFAULT_ERROR_RANGE, DEFAULT_ERROR_RANGE)
    }
}

/// Counts of `samples` in `bins` equal bins over `lo..=hi`. Returns the bin
/// edges and the counts; the top edge belongs to the last bin.
pub fn histogram(samples: &Array1<f64>, lo: f64, hi: f64, bins: usize) -> (Array1<f64>, Array1<usize>) {
    let edges = Array1::from_shape_fn(bins + 1, |i| lo + (hi - lo) * i as f64 / bins as f64);
    let mut counts = Array1::<usize>::zeros(bins);
    if bins == 0 || hi <= lo {
        return (edges, counts);
    }
    for &v in samples.iter().filter(|v| **v >= lo && **v <= hi) {
        let idx = (((v - lo) / (hi - lo)) * bins as f64) as usize;
        counts[idx.min(bins - 1)] += 1;
    }
    (edges, counts)
}

/// Histogram of one axis on the shared range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistogram {
    pub axis: Axis,
    pub bin_edges: Array1<f64>,
    pub counts: Array1<usize>,
    pub samples: ErrorSamples,
}

/// Histograms for every axis that has both setpoint and filtered gyro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistogramSet {
    /// Shared `(min, max)` range, symmetric about zero.
    pub range: (f64, f64),
    pub histograms: BTreeMap<Axis, ErrorHistogram>,
    /// Requested axes skipped for lack of inputs.
    pub skipped: Vec<Axis>,
}

/// Error histograms for `axes` on one shared symmetric range. Axes without a
/// setpoint or filtered gyro are listed in `skipped`; other failures abort.
pub fn compute_error_histograms(
    table: &SignalTable,
    axes: &[Axis],
    config: &ErrorHistogramConfig,
) -> AnalysisResult<ErrorHistogramSet> {
    config.validate()?;
    let mut per_axis = BTreeMap::new();
    let mut skipped = Vec::new();
    for &axis in axes {
        let inputs = table
            .get(&SignalKey::Setpoint(axis))
            .and_then(|sp| table.get(&SignalKey::gyro_filtered(axis)).map(|gyro| (sp, gyro)));
        let (setpoint, gyro) = match inputs {
            Ok(pair) => pair,
            Err(AnalysisError::MissingSignal(key)) => {
                debug!(axis = %axis, missing = %key, "Error histogram skipped for axis");
                skipped.push(axis);
                continue;
            }
            Err(e) => return Err(e),
        };
        let error = tracking_error(axis, setpoint, gyro)?;
        per_axis.insert(axis, remove_outliers(&error.values, config.outlier_sigma));
    }

    let range = symmetric_range(per_axis.values().map(|s: &ErrorSamples| &s.kept));
    let histograms = per_axis
        .into_iter()
        .map(|(axis, samples)| {
            let (bin_edges, counts) = histogram(&samples.kept, range.0, range.1, config.bins);
            (axis, ErrorHistogram { axis, bin_edges, counts, samples })
        })
        .collect::<BTreeMap<_, _>>();

    info!(
        axes = histograms.len(),
        skipped = skipped.len(),
        range = range.1,
        "Error histograms complete"
    );
    Ok(ErrorHistogramSet { range, histograms, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_input::header_params::HeaderParams;

    #[test]
    fn test_outliers_beyond_three_sigma_are_dropped() {
        let mut values = vec![1.0, -1.0].repeat(50);
        values.push(40.0);
        let samples = remove_outliers(&Array1::from(values), 3.0);
        assert_eq!(samples.outliers_removed, 1);
        assert_eq!(samples.kept.len(), 100);
        assert!(samples.kept.iter().all(|v| v.abs() == 1.0));
    }

    #[test]
    fn test_constant_error_is_kept() {
        let samples = remove_outliers(&Array1::from(vec![2.0; 10]), 3.0);
        assert_eq!(samples.kept.len(), 10);
        assert_eq!(samples.std_dev, 0.0);
    }

    #[test]
    fn test_symmetric_range_and_default() {
        let a = Array1::from(vec![-3.0, 1.0]);
        let b = Array1::from(vec![7.5]);
        assert_eq!(symmetric_range([&a, &b]), (-7.5, 7.5));
        assert_eq!(symmetric_range(std::iter::empty()), (-50.0, 50.0));
    }

    #[test]
    fn test_histogram_includes_top_edge() {
        let (edges, counts) = histogram(&Array1::from(vec![-1.0, -0.5, 0.0, 0.99, 1.0, 2.0]), -1.0, 1.0, 4);
        assert_eq!(edges.to_vec(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(counts.to_vec(), vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_axes_share_one_range() {
        let n = 200;
        let time = (0..n).map(|i| i as f64 * 0.001).collect();
        let roll_sp: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 5.0 } else { -5.0 }).collect();
        let pitch_sp: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 20.0 } else { -20.0 }).collect();
        let table = SignalTable::from_columns(
            time,
            vec![
                (SignalKey::Setpoint(Axis::Roll), roll_sp),
                (SignalKey::gyro_filtered(Axis::Roll), vec![0.0; n]),
                (SignalKey::Setpoint(Axis::Pitch), pitch_sp),
                (SignalKey::gyro_filtered(Axis::Pitch), vec![0.0; n]),
            ],
            HeaderParams::default(),
        )
        .unwrap();
        let set = compute_error_histograms(&table, &Axis::ALL, &ErrorHistogramConfig::default()).unwrap();
        assert_eq!(set.range, (-20.0, 20.0));
        assert_eq!(set.skipped, vec![Axis::Yaw]);
        let roll = &set.histograms[&Axis::Roll];
        let pitch = &set.histograms[&Axis::Pitch];
        assert_eq!(roll.bin_edges, pitch.bin_edges);
        assert_eq!(roll.counts.sum(), n);
        assert_eq!(pitch.counts[0], n / 2);
        assert_eq!(pitch.counts[49], n / 2);
    }
}
