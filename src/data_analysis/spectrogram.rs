// src/data_analysis/spectrogram.rs

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::axis_names::Axis;
use crate::config::SpectrogramConfig;
use crate::constants::SPECTROGRAM_MIN_POWER_DB;
use crate::data_analysis::fft_utils::{self, apply_one_sided_scaling, FrameTransform};
use crate::data_analysis::smoothing::smooth_2d;
use crate::error::{AnalysisError, AnalysisResult};
use crate::session::CancelToken;
use crate::signal_table::{SignalKey, SignalSeries, SignalTable};

/// Short-time power spectrum, `power[[time_bin, frequency_bin]]` in scaled dB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramResult {
    pub time_bins: usize,
    pub frequency_bins: usize,
    /// Centre time of each frame, seconds.
    pub times: Array1<f64>,
    pub frequencies: Array1<f64>,
    pub power: Array2<f64>,
    pub window_size: usize,
    pub step: usize,
}

fn to_db(power: f64) -> f64 {
    if power > 0.0 {
        (10.0 * power.log10()).max(SPECTROGRAM_MIN_POWER_DB)
    } else {
        SPECTROGRAM_MIN_POWER_DB
    }
}

/// Short-time FFT of one series.
///
/// Frames of `window_size` samples advance by `step`; each frame is
/// de-meaned and Hann-windowed, its one-sided power density converted to dB,
/// the matrix smoothed along time and frequency, then scaled by `gain`.
/// `cancel` is checked before every frame.
pub fn spectrogram_of_series(
    series: &SignalSeries,
    sample_rate: f64,
    config: &SpectrogramConfig,
    cancel: &CancelToken,
) -> AnalysisResult<SpectrogramResult> {
    config.validate()?;
    let n = series.len();
    let window_size = config.window_size;
    if n < window_size {
        return Err(AnalysisError::InsufficientSamples { required: window_size, available: n });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AnalysisError::InsufficientSamples { required: 2, available: n.min(1) });
    }

    let step = config.step();
    let time_bins = (n - window_size) / step + 1;
    let freq_bins = fft_utils::rfft_len(window_size);

    let window_func = fft_utils::hann_window(window_size);
    let window_energy: f64 = window_func.iter().map(|w| w * w).sum();
    let density_scale = 1.0 / (sample_rate * window_energy);

    let mut transform = FrameTransform::new(window_size);
    let mut power = Array2::<f64>::zeros((time_bins, freq_bins));
    let mut times = Array1::<f64>::zeros(time_bins);

    for frame in 0..time_bins {
        if cancel.is_cancelled() {
            debug!(frame, "Spectrogram cancelled");
            return Err(AnalysisError::Cancelled);
        }
        let start = frame * step;
        let end = start + window_size;
        let segment = series.values.slice(s![start..end]);
        let mean = segment.mean().unwrap_or(0.0);

        times[frame] = (series.time[start] + series.time[end - 1]) / 2.0;

        let spectrum = transform.process(segment.iter().zip(window_func.iter()).map(|(v, w)| (v - mean) * w));
        let mut frame_power = spectrum.mapv(|c| c.norm_sqr() * density_scale);
        apply_one_sided_scaling(&mut frame_power, window_size);
        power.row_mut(frame).assign(&frame_power.mapv(to_db));
    }

    let mut power = smooth_2d(&power, config.time_smoothing, config.freq_smoothing);
    power.mapv_inplace(|p| p * config.gain);

    let mut frequencies = fft_utils::rfft_frequencies(window_size, sample_rate);
    if let Some(max_hz) = config.max_frequency_hz {
        let keep = frequencies.iter().take_while(|&&f| f <= max_hz).count();
        frequencies = frequencies.slice(s![..keep]).to_owned();
        power = power.slice(s![.., ..keep]).to_owned();
    }

    Ok(SpectrogramResult {
        time_bins,
        frequency_bins: frequencies.len(),
        times,
        frequencies,
        power,
        window_size,
        step,
    })
}

/// Spectrogram of one axis' gyro series from a loaded table.
pub fn compute_spectrogram_with(
    table: &SignalTable,
    axis: Axis,
    config: &SpectrogramConfig,
    cancel: &CancelToken,
) -> AnalysisResult<SpectrogramResult> {
    let key = SignalKey::Gyro { source: config.source, axis };
    let series = table.get(&key)?;
    let result = spectrogram_of_series(series, table.sample_rate_hz, config, cancel)?;
    info!(
        signal = %key,
        window = config.window_size,
        time_bins = result.time_bins,
        frequency_bins = result.frequency_bins,
        "Spectrogram complete"
    );
    Ok(result)
}

/// Spectrogram of the filtered gyro for `axis`. `smoothing` is the
/// (time, frequency) pair of odd smoothing widths.
pub fn compute_spectrogram(
    table: &SignalTable,
    axis: Axis,
    window_size: usize,
    gain: f64,
    smoothing: (usize, usize),
) -> AnalysisResult<SpectrogramResult> {
    let config = SpectrogramConfig {
        window_size,
        gain,
        time_smoothing: smoothing.0,
        freq_smoothing: smoothing.1,
        ..SpectrogramConfig::default()
    };
    compute_spectrogram_with(table, axis, &config, &CancelToken::default())
}
