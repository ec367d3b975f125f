// src/data_analysis/throttle_noise.rs

//! Gyro noise against throttle.
//!
//! The gyro series is cut into heavily overlapping Hann-windowed frames. Each
//! frame's magnitude spectrum is added to the throttle column of the frame's
//! mean throttle, and every column is then divided by the number of frames
//! that landed in it, so long cruise segments do not outweigh short punches.

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::axis_names::Axis;
use crate::config::ThrottleNoiseConfig;
use crate::constants::{NOISE_FFT_BLOCK, THROTTLE_MAX_PERCENT, THROTTLE_PWM_DETECT, THROTTLE_PWM_MIN};
use crate::data_analysis::fft_utils::{self, FrameTransform};
use crate::data_analysis::smoothing::gaussian_smooth_rows;
use crate::error::{AnalysisError, AnalysisResult};
use crate::session::CancelToken;
use crate::signal_table::{GyroSource, SignalKey, SignalSeries, SignalTable};

/// Noise amplitude per (frequency, throttle) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleNoiseResult {
    pub axis: Axis,
    pub source: GyroSource,
    /// Throttle bin edges in percent; one more than the number of bins.
    pub throttle_edges: Array1<f64>,
    /// Lower edge of each frequency bin, Hz.
    pub frequencies: Array1<f64>,
    /// Frames whose mean throttle fell in each bin.
    pub throttle_counts: Array1<usize>,
    /// `[[frequency_bin, throttle_bin]]`, divided by the throttle counts.
    pub normalized: Array2<f64>,
    /// `normalized` smoothed along throttle and multiplied by the gain.
    pub smoothed: Array2<f64>,
    pub max_value: f64,
    pub frame_count: usize,
    pub frame_len: usize,
    pub hop: usize,
}

/// Throttle in percent. Values that look like 1000..2000 PWM are rescaled;
/// the result is clamped to 0..=100.
pub fn throttle_percent(raw: &Array1<f64>) -> Array1<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > THROTTLE_PWM_DETECT {
        raw.mapv(|v| ((v - THROTTLE_PWM_MIN) / 10.0).clamp(0.0, THROTTLE_MAX_PERCENT))
    } else {
        raw.mapv(|v| v.clamp(0.0, THROTTLE_MAX_PERCENT))
    }
}

/// Index of `value` among `bins` equal bins over `lo..=hi`; the top edge
/// belongs to the last bin.
fn bin_index(value: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !(value >= lo && value <= hi) || hi <= lo {
        return None;
    }
    let idx = ((value - lo) / (hi - lo) * bins as f64) as usize;
    Some(idx.min(bins - 1))
}

/// Noise map of one gyro series against a throttle series in percent.
pub fn noise_map_of_series(
    gyro: &SignalSeries,
    throttle_pct: &Array1<f64>,
    sample_rate: f64,
    config: &ThrottleNoiseConfig,
    cancel: &CancelToken,
) -> AnalysisResult<ThrottleNoiseResult> {
    config.validate()?;
    let n = gyro.len();
    if throttle_pct.len() != n {
        return Err(AnalysisError::ShapeMismatch {
            context: "noise map gyro/throttle",
            expected: n,
            actual: throttle_pct.len(),
        });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AnalysisError::InsufficientSamples { required: 2, available: n.min(1) });
    }
    let axis = gyro
        .key
        .axis()
        .ok_or_else(|| AnalysisError::invalid_config(format!("{} is not a per-axis signal", gyro.key)))?;
    let source = match gyro.key {
        SignalKey::Gyro { source, .. } => source,
        _ => GyroSource::Filtered,
    };

    let frame_len = (config.frame_length_s * sample_rate).round() as usize;
    if frame_len < 2 {
        return Err(AnalysisError::invalid_config(format!(
            "noise frame of {} s is shorter than two samples at {:.1} Hz",
            config.frame_length_s, sample_rate
        )));
    }
    let hop = (frame_len / config.superposition).max(1);
    let frame_count = (0..(n / hop).saturating_sub(config.superposition))
        .take_while(|i| i * hop + frame_len <= n)
        .count();
    if frame_count == 0 {
        return Err(AnalysisError::InsufficientSamples {
            required: ((config.superposition + 1) * hop).max(frame_len),
            available: n,
        });
    }

    let padded = frame_len.div_ceil(NOISE_FFT_BLOCK) * NOISE_FFT_BLOCK;
    let fft_freqs = fft_utils::rfft_frequencies(padded, sample_rate);
    let freq_lo = fft_freqs[0];
    let freq_hi = fft_freqs[fft_freqs.len() - 1];
    let freq_bins = (fft_freqs.len() / config.freq_bin_group).max(1);
    let fft_to_bin: Vec<Option<usize>> = fft_freqs
        .iter()
        .map(|&f| bin_index(f, freq_lo, freq_hi, freq_bins))
        .collect();
    let throttle_bins = config.throttle_bins;

    let window = fft_utils::hann_window(frame_len);
    let ortho = 1.0 / (padded as f64).sqrt();
    let mut transform = FrameTransform::new(padded);
    let mut sums = Array2::<f64>::zeros((freq_bins, throttle_bins));
    let mut throttle_counts = Array1::<usize>::zeros(throttle_bins);

    for frame in 0..frame_count {
        if cancel.is_cancelled() {
            debug!(frame, "Noise map cancelled");
            return Err(AnalysisError::Cancelled);
        }
        let start = frame * hop;
        let end = start + frame_len;
        let mean_throttle = throttle_pct.slice(s![start..end]).mean().unwrap_or(0.0);
        let Some(tb) = bin_index(mean_throttle, 0.0, THROTTLE_MAX_PERCENT, throttle_bins) else {
            continue;
        };
        throttle_counts[tb] += 1;

        let segment = gyro.values.slice(s![start..end]);
        let spectrum = transform.process(segment.iter().zip(window.iter()).map(|(v, w)| v * w));
        for (bin, c) in fft_to_bin.iter().zip(spectrum.iter()) {
            if let Some(fb) = *bin {
                sums[[fb, tb]] += c.norm() * ortho;
            }
        }
    }

    let mut normalized = sums;
    for (tb, &count) in throttle_counts.iter().enumerate() {
        if count > 0 {
            normalized.column_mut(tb).mapv_inplace(|v| v / count as f64);
        }
    }
    let mut smoothed = gaussian_smooth_rows(&normalized, config.smoothing_sigma);
    smoothed.mapv_inplace(|v| v * config.gain);
    let max_value = smoothed.iter().copied().fold(0.0, f64::max);

    let throttle_edges =
        Array1::from_shape_fn(throttle_bins + 1, |i| i as f64 * THROTTLE_MAX_PERCENT / throttle_bins as f64);
    let frequencies =
        Array1::from_shape_fn(freq_bins, |k| freq_lo + k as f64 * (freq_hi - freq_lo) / freq_bins as f64);

    Ok(ThrottleNoiseResult {
        axis,
        source,
        throttle_edges,
        frequencies,
        throttle_counts,
        normalized,
        smoothed,
        max_value,
        frame_count,
        frame_len,
        hop,
    })
}

/// Noise map for one axis of a loaded table. Needs the throttle channel and
/// the configured gyro family.
pub fn compute_throttle_noise_with(
    table: &SignalTable,
    axis: Axis,
    config: &ThrottleNoiseConfig,
    cancel: &CancelToken,
) -> AnalysisResult<ThrottleNoiseResult> {
    let key = SignalKey::Gyro { source: config.source, axis };
    let gyro = table.get(&key)?;
    let throttle = throttle_percent(&table.get(&SignalKey::Throttle)?.values);
    let result = noise_map_of_series(gyro, &throttle, table.sample_rate_hz, config, cancel)?;
    info!(
        signal = %key,
        frames = result.frame_count,
        frame_len = result.frame_len,
        max = result.max_value,
        "Throttle noise map complete"
    );
    Ok(result)
}

/// Noise map of the filtered gyro with default settings.
pub fn compute_throttle_noise(table: &SignalTable, axis: Axis) -> AnalysisResult<ThrottleNoiseResult> {
    compute_throttle_noise_with(table, axis, &ThrottleNoiseConfig::default(), &CancelToken::default())
}
