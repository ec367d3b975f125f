// src/data_analysis/calc_step_response.rs

//! Step response from arbitrary flight segments.
//!
//! Setpoint edges are detected, a fixed window around each onset is cut out,
//! windows whose peak setpoint is too small are rejected, and the rest are
//! normalised by their step size. A normalised window whose steady-state mean
//! leaves the configured band (a stick reversal inside the post-roll, say) is
//! rejected too; survivors are averaged sample-wise. Statistics come
//! from the averaged curve. Too few useful windows is reported through
//! `insufficient_data`, never as an error.

use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axis_names::Axis;
use crate::config::StepResponseThresholds;
use crate::constants::STEP_MIN_NORMALIZING_DELTA;
use crate::data_analysis::smoothing::moving_average_centered;
use crate::error::{AnalysisError, AnalysisResult};
use crate::signal_table::{SignalKey, SignalTable};

/// A candidate step segment cut around one detected onset.
#[derive(Debug, Clone, PartialEq)]
pub struct StepWindow {
    pub axis: Axis,
    /// Index of the first window sample in the source series.
    pub start_index: usize,
    pub length: usize,
    pub setpoint_segment: Array1<f64>,
    pub actual_segment: Array1<f64>,
    /// Largest |setpoint| inside the window.
    pub peak_amplitude: f64,
}

impl StepWindow {
    pub fn new(axis: Axis, start_index: usize, setpoint_segment: Array1<f64>, actual_segment: Array1<f64>) -> Self {
        let peak_amplitude = setpoint_segment.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        Self {
            axis,
            start_index,
            length: setpoint_segment.len(),
            setpoint_segment,
            actual_segment,
            peak_amplitude,
        }
    }

    /// Response scaled so the setpoint step is 1: `(actual - actual_base) / (target - setpoint_base)`.
    /// `None` when the setpoint barely moves.
    fn normalized(&self, pre_samples: usize) -> Option<Array1<f64>> {
        let pre = pre_samples.min(self.length.saturating_sub(1));
        let base = |segment: &Array1<f64>| -> f64 {
            if pre == 0 {
                segment[0]
            } else {
                segment.slice(s![..pre]).mean().unwrap_or(segment[0])
            }
        };
        let setpoint_base = base(&self.setpoint_segment);
        let actual_base = base(&self.actual_segment);
        let target = self.setpoint_segment.slice(s![pre..]).mean()?;
        let delta = target - setpoint_base;
        if !delta.is_finite() || delta.abs() < STEP_MIN_NORMALIZING_DELTA {
            return None;
        }
        Some(self.actual_segment.mapv(|v| (v - actual_base) / delta))
    }
}

/// Scalar metrics of one averaged response curve. Times are seconds after onset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResponseStats {
    pub final_value: Option<f64>,
    pub peak_value: Option<f64>,
    pub rise_time: Option<f64>,
    pub delay_time: Option<f64>,
    pub overshoot_pct: Option<f64>,
    pub settling_time: Option<f64>,
}

/// Averaged curve for a subset of the useful windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub window_count: usize,
    pub curve: Array1<f64>,
    pub stats: StepResponseStats,
}

/// Per-axis step response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponseResult {
    pub axis: Axis,
    /// Seconds relative to the step onset; negative during the pre-roll.
    pub normalized_time_axis: Array1<f64>,
    pub averaged_response_curve: Array1<f64>,
    pub useful_window_count: usize,
    pub total_window_count: usize,
    pub rise_time: Option<f64>,
    pub overshoot_pct: Option<f64>,
    pub settling_time: Option<f64>,
    pub delay_time: Option<f64>,
    pub peak_value: Option<f64>,
    pub insufficient_data: bool,
    /// Windows whose peak setpoint is below the split.
    pub low_setpoint: Option<GroupResponse>,
    /// Windows whose peak setpoint is at or above the split.
    pub high_setpoint: Option<GroupResponse>,
}

struct WindowGeometry {
    lag: usize,
    pre: usize,
    post: usize,
}

impl WindowGeometry {
    fn new(sample_rate: f64, thresholds: &StepResponseThresholds) -> Self {
        Self {
            lag: ((thresholds.edge_interval_s * sample_rate).round() as usize).max(1),
            pre: (thresholds.pre_roll_s * sample_rate).round() as usize,
            post: ((thresholds.post_roll_s * sample_rate).round() as usize).max(1),
        }
    }

    fn length(&self) -> usize {
        self.pre + self.post
    }

    /// Window indices covering the steady-state segment after the onset.
    fn steady_state(&self, sample_rate: f64, thresholds: &StepResponseThresholds) -> Range<usize> {
        let start = self.pre + (thresholds.steady_state_start_s * sample_rate).round() as usize;
        let end = self.pre + (thresholds.steady_state_end_s * sample_rate).round() as usize;
        start.min(self.length())..end.min(self.length())
    }
}

/// True when the normalised steady-state mean lies inside the configured band.
/// Windows too short to contain a steady-state segment are kept.
fn passes_steady_state_check(response: &Array1<f64>, segment: &Range<usize>, thresholds: &StepResponseThresholds) -> bool {
    if segment.is_empty() || segment.end > response.len() {
        return true;
    }
    match response.slice(s![segment.start..segment.end]).mean() {
        Some(mean) => mean.is_finite() && mean >= thresholds.steady_state_min && mean <= thresholds.steady_state_max,
        None => true,
    }
}

fn check_sample_rate(sample_rate: f64) -> AnalysisResult<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid_config(format!("sample rate must be positive, got {}", sample_rate)))
    }
}

/// Finds step onsets in `setpoint` and cuts a window around each one.
///
/// An edge is a change of more than `edge_threshold` within `edge_interval_s`;
/// the onset is the steepest single-sample change inside that interval. After
/// an onset, detection resumes once its post-roll has passed. Onsets too close
/// to either end for a full window are dropped.
pub fn detect_step_windows(
    axis: Axis,
    setpoint: &Array1<f64>,
    actual: &Array1<f64>,
    sample_rate: f64,
    thresholds: &StepResponseThresholds,
) -> AnalysisResult<Vec<StepWindow>> {
    if setpoint.len() != actual.len() {
        return Err(AnalysisError::ShapeMismatch {
            context: "step response setpoint/actual",
            expected: setpoint.len(),
            actual: actual.len(),
        });
    }
    check_sample_rate(sample_rate)?;
    let geometry = WindowGeometry::new(sample_rate, thresholds);
    let n = setpoint.len();
    let length = geometry.length();

    let mut windows = Vec::new();
    let mut dropped = 0usize;
    let mut i = 0usize;
    while i + geometry.lag < n {
        if (setpoint[i + geometry.lag] - setpoint[i]).abs() <= thresholds.edge_threshold {
            i += 1;
            continue;
        }
        let onset = (i + 1..=i + geometry.lag)
            .max_by(|&a, &b| {
                let da = (setpoint[a] - setpoint[a - 1]).abs();
                let db = (setpoint[b] - setpoint[b - 1]).abs();
                // Earliest index wins ties.
                da.total_cmp(&db).then(b.cmp(&a))
            })
            .unwrap_or(i + 1);

        if onset >= geometry.pre && onset - geometry.pre + length <= n {
            let start = onset - geometry.pre;
            let end = start + length;
            windows.push(StepWindow::new(
                axis,
                start,
                setpoint.slice(s![start..end]).to_owned(),
                actual.slice(s![start..end]).to_owned(),
            ));
        } else {
            dropped += 1;
        }
        i = onset + geometry.post;
    }

    debug!(axis = %axis, windows = windows.len(), dropped, "Detected step windows");
    Ok(windows)
}

/// Sample-wise mean of equally long responses; non-finite samples are skipped.
pub fn average_responses(responses: &[Array1<f64>], response_len: usize) -> Array1<f64> {
    let mut sum = Array1::<f64>::zeros(response_len);
    let mut counts = Array1::<f64>::zeros(response_len);
    for response in responses.iter().filter(|r| r.len() == response_len) {
        for (j, &v) in response.iter().enumerate() {
            if v.is_finite() {
                sum[j] += v;
                counts[j] += 1.0;
            }
        }
    }
    Array1::from_shape_fn(response_len, |j| if counts[j] > 0.0 { sum[j] / counts[j] } else { f64::NAN })
}

fn first_crossing(curve: ArrayView1<f64>, time: ArrayView1<f64>, level: f64) -> Option<f64> {
    curve.iter().zip(time.iter()).find(|&(&v, _)| v >= level).map(|(_, &t)| t)
}

/// Rise, delay, overshoot and settling of a normalised curve. Only samples at
/// or after the onset take part.
pub fn response_statistics(
    curve: &Array1<f64>,
    time: &Array1<f64>,
    thresholds: &StepResponseThresholds,
) -> StepResponseStats {
    let Some(onset) = time.iter().position(|&t| t >= 0.0) else {
        return StepResponseStats::default();
    };
    let after = curve.slice(s![onset..]);
    let t_after = time.slice(s![onset..]);

    let steady: Vec<f64> = after
        .iter()
        .zip(t_after.iter())
        .filter(|&(v, &t)| v.is_finite() && t >= thresholds.steady_state_start_s && t <= thresholds.steady_state_end_s)
        .map(|(&v, _)| v)
        .collect();
    if steady.is_empty() {
        return StepResponseStats::default();
    }
    let final_value = steady.iter().sum::<f64>() / steady.len() as f64;
    if !final_value.is_finite() || final_value.abs() < STEP_MIN_NORMALIZING_DELTA {
        return StepResponseStats { final_value: Some(final_value), ..Default::default() };
    }

    // Work on the curve relative to its final value so negative finals behave.
    let relative = after.mapv(|v| v / final_value);
    let peak_relative = relative.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let peak_value = peak_relative * final_value;

    let rise_time = first_crossing(relative.view(), t_after, thresholds.rise_fraction);
    let delay_time = first_crossing(relative.view(), t_after, thresholds.delay_fraction);
    let overshoot_pct = ((peak_relative - 1.0) * 100.0).max(0.0);

    let last_outside = relative
        .iter()
        .rposition(|v| !v.is_finite() || (v - 1.0).abs() > thresholds.settling_tolerance);
    let settling_time = match last_outside {
        None => t_after.get(0).copied(),
        Some(idx) if idx + 1 < t_after.len() => Some(t_after[idx + 1]),
        Some(_) => None,
    };

    StepResponseStats {
        final_value: Some(final_value),
        peak_value: Some(peak_value),
        rise_time,
        delay_time,
        overshoot_pct: Some(overshoot_pct),
        settling_time,
    }
}

fn group_response(
    normalized: &[(f64, Array1<f64>)],
    keep: impl Fn(f64) -> bool,
    time: &Array1<f64>,
    thresholds: &StepResponseThresholds,
) -> Option<GroupResponse> {
    let members: Vec<Array1<f64>> = normalized
        .iter()
        .filter(|(peak, _)| keep(*peak))
        .map(|(_, r)| r.clone())
        .collect();
    if members.is_empty() {
        return None;
    }
    let curve = moving_average_centered(&average_responses(&members, time.len()), thresholds.smoothing_window);
    let stats = response_statistics(&curve, time, thresholds);
    Some(GroupResponse { window_count: members.len(), curve, stats })
}

/// Quality-filters, aligns and averages step windows into a result.
///
/// A window is useful when its peak setpoint exceeds `min_peak_amplitude`,
/// its step can be normalised, and its normalised steady-state mean lies in
/// `steady_state_min..=steady_state_max`. Statistics are best-effort: they
/// are computed from whatever useful windows exist.
pub fn aggregate_windows(
    axis: Axis,
    windows: &[StepWindow],
    sample_rate: f64,
    thresholds: &StepResponseThresholds,
) -> AnalysisResult<StepResponseResult> {
    check_sample_rate(sample_rate)?;
    let geometry = WindowGeometry::new(sample_rate, thresholds);
    let length = geometry.length();
    let steady_state = geometry.steady_state(sample_rate, thresholds);

    let candidates: Vec<(f64, Array1<f64>)> = windows
        .iter()
        .filter(|w| w.length == length && w.peak_amplitude > thresholds.min_peak_amplitude)
        .filter_map(|w| w.normalized(geometry.pre).map(|r| (w.peak_amplitude, r)))
        .collect();
    let normalizable = candidates.len();
    let normalized: Vec<(f64, Array1<f64>)> = candidates
        .into_iter()
        .filter(|(_, r)| passes_steady_state_check(r, &steady_state, thresholds))
        .collect();
    if normalized.len() < normalizable {
        debug!(
            axis = %axis,
            rejected = normalizable - normalized.len(),
            "Rejected windows outside the steady-state band"
        );
    }

    let useful_window_count = normalized.len();
    let total_window_count = windows.len();
    let insufficient_data = useful_window_count < thresholds.min_useful_windows;

    let time = if useful_window_count > 0 {
        Array1::from_shape_fn(length, |k| (k as f64 - geometry.pre as f64) / sample_rate)
    } else {
        Array1::zeros(0)
    };
    let all = group_response(&normalized, |_| true, &time, thresholds);
    let low = group_response(&normalized, |peak| peak < thresholds.setpoint_split, &time, thresholds);
    let high = group_response(&normalized, |peak| peak >= thresholds.setpoint_split, &time, thresholds);

    let (curve, stats) = match all {
        Some(group) => (group.curve, group.stats),
        None => (Array1::zeros(0), StepResponseStats::default()),
    };

    if insufficient_data {
        warn!(
            axis = %axis,
            useful = useful_window_count,
            total = total_window_count,
            required = thresholds.min_useful_windows,
            "Step response built from too few useful windows"
        );
    }

    Ok(StepResponseResult {
        axis,
        normalized_time_axis: time,
        averaged_response_curve: curve,
        useful_window_count,
        total_window_count,
        rise_time: stats.rise_time,
        overshoot_pct: stats.overshoot_pct,
        settling_time: stats.settling_time,
        delay_time: stats.delay_time,
        peak_value: stats.peak_value,
        insufficient_data,
        low_setpoint: low,
        high_setpoint: high,
    })
}

/// Step response of one axis from an equalized table.
pub fn step_response_for_axis(
    table: &SignalTable,
    axis: Axis,
    thresholds: &StepResponseThresholds,
) -> AnalysisResult<StepResponseResult> {
    let setpoint = &table.get(&SignalKey::Setpoint(axis))?.values;
    let actual = &table.get(&SignalKey::gyro_filtered(axis))?.values;
    let windows = detect_step_windows(axis, setpoint, actual, table.sample_rate_hz, thresholds)?;
    let result = aggregate_windows(axis, &windows, table.sample_rate_hz, thresholds)?;
    info!(
        axis = %axis,
        useful = result.useful_window_count,
        total = result.total_window_count,
        rise_time = ?result.rise_time,
        overshoot_pct = ?result.overshoot_pct,
        "Step response complete"
    );
    Ok(result)
}

/// Step response for each requested axis. Only the setpoint and filtered gyro
/// of those axes are resampled onto a uniform grid. An axis missing either
/// input gets its own error entry; the other axes are unaffected.
pub fn compute_step_response(
    table: &SignalTable,
    axes: &[Axis],
    thresholds: &StepResponseThresholds,
) -> AnalysisResult<BTreeMap<Axis, AnalysisResult<StepResponseResult>>> {
    thresholds.validate()?;
    let inputs: Vec<SignalKey> = axes
        .iter()
        .flat_map(|&axis| [SignalKey::Setpoint(axis), SignalKey::gyro_filtered(axis)])
        .collect();
    let equalized = table.equalized_keys(&inputs);
    let mut results = BTreeMap::new();
    for &axis in axes {
        let result = step_response_for_axis(&equalized, axis, thresholds);
        if let Err(e) = &result {
            warn!(axis = %axis, error = %e, "Step response skipped for axis");
        }
        results.insert(axis, result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 1000.0;

    /// Setpoint steps 0 -> amp at `at`; actual follows with a first-order lag.
    fn step_pair(n: usize, at: usize, amp: f64, tau_s: f64) -> (Array1<f64>, Array1<f64>) {
        let setpoint = Array1::from_shape_fn(n, |i| if i >= at { amp } else { 0.0 });
        let actual = Array1::from_shape_fn(n, |i| {
            if i < at {
                0.0
            } else {
                amp * (1.0 - (-((i - at) as f64 / FS) / tau_s).exp())
            }
        });
        (setpoint, actual)
    }

    #[test]
    fn test_detects_single_step_at_onset() {
        let (sp, gyro) = step_pair(2000, 500, 300.0, 0.02);
        let thresholds = StepResponseThresholds::default();
        let windows = detect_step_windows(Axis::Roll, &sp, &gyro, FS, &thresholds).unwrap();
        assert_eq!(windows.len(), 1);
        // 20 ms pre-roll at 1 kHz.
        assert_eq!(windows[0].start_index, 480);
        assert_eq!(windows[0].length, 520);
        assert_eq!(windows[0].peak_amplitude, 300.0);
    }

    #[test]
    fn test_step_near_end_is_dropped() {
        let (sp, gyro) = step_pair(800, 500, 300.0, 0.02);
        let windows = detect_step_windows(Axis::Roll, &sp, &gyro, FS, &StepResponseThresholds::default()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_first_order_statistics() {
        let tau = 0.02;
        let (sp, gyro) = step_pair(2000, 500, 300.0, tau);
        let thresholds = StepResponseThresholds { smoothing_window: 1, ..Default::default() };
        let windows = detect_step_windows(Axis::Pitch, &sp, &gyro, FS, &thresholds).unwrap();
        let result = aggregate_windows(Axis::Pitch, &windows, FS, &thresholds).unwrap();

        assert_eq!(result.useful_window_count, 1);
        assert!(result.insufficient_data);
        assert_eq!(result.normalized_time_axis.len(), result.averaged_response_curve.len());

        // 90% rise of a first-order lag: tau * ln(10).
        let rise = result.rise_time.unwrap();
        assert!((rise - tau * 10f64.ln()).abs() < 0.002, "rise {}", rise);
        let delay = result.delay_time.unwrap();
        assert!((delay - tau * 2f64.ln()).abs() < 0.002, "delay {}", delay);
        assert!(result.overshoot_pct.unwrap() < 0.01);
        // 5% band: tau * ln(20).
        let settling = result.settling_time.unwrap();
        assert!((settling - tau * 20f64.ln()).abs() < 0.002, "settling {}", settling);
    }

    #[test]
    fn test_overshoot_is_measured_against_final_value() {
        let curve = Array1::from(vec![0.0, 0.0, 0.5, 1.2, 1.0, 1.0, 1.0, 1.0]);
        let time = Array1::from(vec![-0.1, 0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let thresholds = StepResponseThresholds::default();
        let stats = response_statistics(&curve, &time, &thresholds);
        assert!((stats.final_value.unwrap() - (1.2 + 1.0 + 1.0 + 1.0) / 4.0).abs() < 1e-12);
        assert!((stats.peak_value.unwrap() - 1.2).abs() < 1e-12);
        assert!(stats.overshoot_pct.unwrap() > 0.0);
        assert_eq!(stats.rise_time, Some(0.2));
    }

    #[test]
    fn test_useful_count_with_mostly_small_windows() {
        let thresholds = StepResponseThresholds::default();
        let geometry = WindowGeometry::new(FS, &thresholds);
        let length = geometry.length();
        let make = |amp: f64, start: usize| {
            let sp = Array1::from_shape_fn(length, |k| if k >= geometry.pre { amp } else { 0.0 });
            let actual = sp.clone();
            StepWindow::new(Axis::Yaw, start, sp, actual)
        };
        let windows: Vec<StepWindow> = (0..50)
            .map(|i| make(if i % 17 == 0 { 250.0 } else { 40.0 }, i * length))
            .collect();

        let result = aggregate_windows(Axis::Yaw, &windows, FS, &thresholds).unwrap();
        assert_eq!(result.total_window_count, 50);
        assert_eq!(result.useful_window_count, 3);
        assert!(result.insufficient_data);
        assert!(result.useful_window_count <= result.total_window_count);
        assert!(result.rise_time.is_some());
        assert_eq!(result.low_setpoint.as_ref().map(|g| g.window_count), Some(3));
        assert!(result.high_setpoint.is_none());
    }

    #[test]
    fn test_reversal_window_is_rejected() {
        let thresholds = StepResponseThresholds { smoothing_window: 1, ..Default::default() };
        let geometry = WindowGeometry::new(FS, &thresholds);
        let length = geometry.length();
        let clean = |start: usize| {
            let sp = Array1::from_shape_fn(length, |k| if k >= geometry.pre { 300.0 } else { 0.0 });
            StepWindow::new(Axis::Roll, start, sp.clone(), sp)
        };
        // +300 for 249 samples, then -300: the post-roll mean is almost zero.
        let flick_sp = Array1::from_shape_fn(length, |k| match k {
            k if k < geometry.pre => 0.0,
            k if k < geometry.pre + 249 => 300.0,
            _ => -300.0,
        });
        let flick = StepWindow::new(Axis::Roll, 2 * length, flick_sp.clone(), flick_sp);
        let windows = vec![clean(0), clean(length), flick];

        let result = aggregate_windows(Axis::Roll, &windows, FS, &thresholds).unwrap();
        assert_eq!(result.total_window_count, 3);
        assert_eq!(result.useful_window_count, 2);
        let peak = result.averaged_response_curve.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        assert!((peak - 1.0).abs() < 1e-9, "peak {}", peak);
        assert!(result.overshoot_pct.unwrap() < 1e-9);
        assert_eq!(result.rise_time, Some(0.0));
    }

    #[test]
    fn test_steady_state_band_is_configurable() {
        let thresholds = StepResponseThresholds::default();
        let geometry = WindowGeometry::new(FS, &thresholds);
        let length = geometry.length();
        let sp = Array1::from_shape_fn(length, |k| if k >= geometry.pre { 300.0 } else { 0.0 });
        // Settles at twice the setpoint.
        let actual = sp.mapv(|v| 2.0 * v);
        let windows = vec![StepWindow::new(Axis::Pitch, 0, sp, actual)];

        let strict = aggregate_windows(Axis::Pitch, &windows, FS, &thresholds).unwrap();
        assert_eq!(strict.useful_window_count, 0);
        let loose = StepResponseThresholds { steady_state_max: 3.0, ..Default::default() };
        let result = aggregate_windows(Axis::Pitch, &windows, FS, &loose).unwrap();
        assert_eq!(result.useful_window_count, 1);
    }

    #[test]
    fn test_missing_axis_does_not_discard_others() {
        let (sp, gyro) = step_pair(2000, 500, 300.0, 0.02);
        let time: Vec<f64> = (0..2000).map(|i| i as f64 / FS).collect();
        let table = SignalTable::from_columns(
            time,
            vec![(SignalKey::Setpoint(Axis::Roll), sp.to_vec()), (SignalKey::gyro_filtered(Axis::Roll), gyro.to_vec())],
            crate::data_input::header_params::HeaderParams::default(),
        )
        .unwrap();
        let results = compute_step_response(&table, &[Axis::Roll, Axis::Yaw], &StepResponseThresholds::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[&Axis::Roll].as_ref().unwrap().useful_window_count, 1);
        assert!(matches!(
            results[&Axis::Yaw],
            Err(AnalysisError::MissingSignal(SignalKey::Setpoint(Axis::Yaw)))
        ));
    }

    #[test]
    fn test_no_windows_is_a_result_not_an_error() {
        let result = aggregate_windows(Axis::Roll, &[], FS, &StepResponseThresholds::default()).unwrap();
        assert_eq!(result.useful_window_count, 0);
        assert_eq!(result.total_window_count, 0);
        assert!(result.insufficient_data);
        assert!(result.averaged_response_curve.is_empty());
        assert!(result.rise_time.is_none());
    }

    #[test]
    fn test_rerun_is_identical() {
        let (mut sp, mut gyro) = step_pair(6000, 500, 300.0, 0.015);
        for i in 0..6000 {
            if (2500..4000).contains(&i) {
                sp[i] = -600.0;
                gyro[i] = -600.0 * 0.98;
            }
        }
        let thresholds = StepResponseThresholds::default();
        let run = || {
            let windows = detect_step_windows(Axis::Roll, &sp, &gyro, FS, &thresholds).unwrap();
            aggregate_windows(Axis::Roll, &windows, FS, &thresholds).unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.total_window_count, b.total_window_count);
        assert_eq!(a.useful_window_count, b.useful_window_count);
        assert_eq!(a.averaged_response_curve, b.averaged_response_curve);
        assert!(a.high_setpoint.is_some());
    }
}
