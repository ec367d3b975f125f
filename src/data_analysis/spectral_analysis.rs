// src/data_analysis/spectral_analysis.rs

use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::axis_names::Axis;
use crate::config::{PsdConfig, PsdWindow};
use crate::constants::PSD_MIN_SAMPLES;
use crate::data_analysis::fft_utils::{self, apply_one_sided_scaling};
use crate::data_analysis::smoothing::{moving_average_centered, validate_window};
use crate::error::{AnalysisError, AnalysisResult};
use crate::signal_table::{SignalKey, SignalSeries, SignalTable};

/// Power per frequency bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralResult {
    pub frequencies: Array1<f64>,
    pub power: Array1<f64>,
    pub smoothing_window_used: usize,
}

impl SpectralResult {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// The same result restricted to bins at or below `max_hz`.
    pub fn band(&self, max_hz: f64) -> SpectralResult {
        let end = self.frequencies.iter().take_while(|&&f| f <= max_hz).count();
        SpectralResult {
            frequencies: self.frequencies.slice(s![..end]).to_owned(),
            power: self.power.slice(s![..end]).to_owned(),
            smoothing_window_used: self.smoothing_window_used,
        }
    }

    /// Dominant non-DC bin as (frequency, power).
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(self.power.iter())
            .skip(1)
            .filter(|(_, p)| p.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&f, &p)| (f, p))
    }

    /// Power in dB, floored for empty bins.
    pub fn to_db(&self) -> Array1<f64> {
        self.power.mapv(|p| 10.0 * p.max(1e-12).log10())
    }
}

/// Full-range PSD of a series. |X|² of the (optionally de-meaned and
/// windowed) whole series, normalised by the window energy (N for a
/// rectangular window), one-sided.
pub fn power_spectrum(values: &Array1<f64>, sample_rate: f64, config: &PsdConfig) -> AnalysisResult<SpectralResult> {
    let n = values.len();
    if n < PSD_MIN_SAMPLES {
        return Err(AnalysisError::InsufficientSamples { required: PSD_MIN_SAMPLES, available: n });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AnalysisError::InsufficientSamples { required: 2, available: n.min(1) });
    }

    let mean = if config.demean { values.mean().unwrap_or(0.0) } else { 0.0 };
    let (window, window_energy) = match config.window {
        PsdWindow::Rectangular => (None, n as f64),
        PsdWindow::Hann => {
            let w = fft_utils::hann_window(n);
            let energy = w.iter().map(|x| x * x).sum::<f64>();
            (Some(w), energy)
        }
    };
    let prepared = match &window {
        Some(w) => Array1::from_shape_fn(n, |i| (values[i] - mean) * w[i]),
        None => values.mapv(|v| v - mean),
    };

    let spectrum = fft_utils::fft_forward(&prepared);
    let mut power = spectrum.mapv(|c| c.norm_sqr() / window_energy);
    apply_one_sided_scaling(&mut power, n);
    let frequencies = fft_utils::rfft_frequencies(n, sample_rate);

    validate_window(config.smoothing_window, power.len(), "PSD")?;
    let power = moving_average_centered(&power, config.smoothing_window);
    debug!(samples = n, bins = power.len(), smoothing = config.smoothing_window, "Computed PSD");

    Ok(SpectralResult { frequencies, power, smoothing_window_used: config.smoothing_window })
}

/// Full-range PSD and the zoomed band sliced from the same computation.
pub fn psd_of_series(
    series: &SignalSeries,
    sample_rate: f64,
    config: &PsdConfig,
) -> AnalysisResult<(SpectralResult, SpectralResult)> {
    config.validate()?;
    let full = power_spectrum(&series.values, sample_rate, config)?;
    let zoomed = full.band(config.zoom_max_hz);
    Ok((full, zoomed))
}

/// PSD of one axis' gyro series from a loaded table.
pub fn compute_psd_with(
    table: &SignalTable,
    axis: Axis,
    config: &PsdConfig,
) -> AnalysisResult<(SpectralResult, SpectralResult)> {
    let key = SignalKey::Gyro { source: config.source, axis };
    let series = table.get(&key)?;
    let result = psd_of_series(series, table.sample_rate_hz, config)?;
    if let Some((freq, power)) = result.0.peak() {
        info!(signal = %key, peak_hz = freq, peak_power = power, "PSD complete");
    }
    Ok(result)
}

/// PSD of the filtered gyro for `axis` with a caller-chosen smoothing window.
pub fn compute_psd(
    table: &SignalTable,
    axis: Axis,
    smoothing_window: usize,
) -> AnalysisResult<(SpectralResult, SpectralResult)> {
    let config = PsdConfig { smoothing_window, ..PsdConfig::default() };
    compute_psd_with(table, axis, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(n: usize, fs: f64, freq: f64, amp: f64) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| amp * (2.0 * PI * freq * i as f64 / fs).sin())
    }

    #[test]
    fn test_peak_at_sine_frequency() {
        let fs = 1000.0;
        let values = sine(1000, fs, 50.0, 1.0);
        let cfg = PsdConfig { smoothing_window: 1, ..PsdConfig::default() };
        let psd = power_spectrum(&values, fs, &cfg).unwrap();
        assert_eq!(psd.len(), 501);
        let (freq, power) = psd.peak().unwrap();
        assert!((freq - 50.0).abs() < 1e-9);
        // |X|² = (N/2)², doubled one-sided, over N -> N/2.
        assert!((power - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_zoomed_is_slice_of_full() {
        let fs = 2000.0;
        let values = sine(4096, fs, 30.0, 2.0) + sine(4096, fs, 400.0, 1.0);
        for smoothing in [1, 3, 7] {
            for window in [PsdWindow::Rectangular, PsdWindow::Hann] {
                let cfg = PsdConfig { smoothing_window: smoothing, window, ..PsdConfig::default() };
                let series = SignalSeries::new(
                    SignalKey::gyro_filtered(Axis::Roll),
                    std::sync::Arc::new(Array1::from_shape_fn(4096, |i| i as f64 / fs)),
                    values.clone(),
                )
                .unwrap();
                let (full, zoomed) = psd_of_series(&series, fs, &cfg).unwrap();
                assert!(zoomed.frequencies.iter().all(|&f| f <= 100.0));
                assert_eq!(zoomed.power, full.power.slice(s![..zoomed.len()]).to_owned());
                assert!(full.frequencies[zoomed.len()] > 100.0);
            }
        }
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let values = Array1::from(vec![1.0; PSD_MIN_SAMPLES - 1]);
        assert!(matches!(
            power_spectrum(&values, 1000.0, &PsdConfig::default()),
            Err(AnalysisError::InsufficientSamples { required: PSD_MIN_SAMPLES, .. })
        ));
    }

    #[test]
    fn test_even_smoothing_window_rejected() {
        let values = sine(512, 1000.0, 10.0, 1.0);
        let cfg = PsdConfig { smoothing_window: 4, ..PsdConfig::default() };
        assert!(matches!(power_spectrum(&values, 1000.0, &cfg), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_constant_series_has_no_power_after_demean() {
        let values = Array1::from(vec![5.0; 512]);
        let psd = power_spectrum(&values, 1000.0, &PsdConfig::default()).unwrap();
        assert!(psd.power.iter().all(|p| p.abs() < 1e-18));
        assert!(psd.power.iter().all(|p| p.is_finite()));
    }
}
