// src/config.rs

//! Runtime analysis settings. Every field defaults to the value in
//! `constants.rs`; a JSON file only needs to name what it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{AnalysisError, AnalysisResult};
use crate::logging::LogConfig;
use crate::signal_table::GyroSource;

/// Taper applied to the whole series before the PSD transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdWindow {
    #[default]
    Rectangular,
    Hann,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsdConfig {
    /// Odd moving-average width over the power bins; 1 disables smoothing.
    pub smoothing_window: usize,
    pub window: PsdWindow,
    /// Subtract the mean before transforming.
    pub demean: bool,
    pub source: GyroSource,
    /// Upper edge of the zoomed view.
    pub zoom_max_hz: f64,
}

impl Default for PsdConfig {
    fn default() -> Self {
        Self {
            smoothing_window: DEFAULT_PSD_SMOOTHING_WINDOW,
            window: PsdWindow::Rectangular,
            demean: true,
            source: GyroSource::Filtered,
            zoom_max_hz: PSD_ZOOM_MAX_FREQ_HZ,
        }
    }
}

impl PsdConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.smoothing_window == 0 || self.smoothing_window % 2 == 0 {
            return Err(AnalysisError::invalid_config(format!(
                "PSD smoothing window must be odd and >= 1, got {}",
                self.smoothing_window
            )));
        }
        if !(self.zoom_max_hz > 0.0) {
            return Err(AnalysisError::invalid_config("PSD zoom band must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Frame length in samples; a power of two in [2^8, 2^14].
    pub window_size: usize,
    pub overlap_fraction: f64,
    /// Multiplier applied after the dB conversion and smoothing.
    pub gain: f64,
    /// Odd smoothing widths across adjacent time and frequency bins.
    pub time_smoothing: usize,
    pub freq_smoothing: usize,
    /// Drop frequency bins above this value, if set.
    pub max_frequency_hz: Option<f64>,
    pub source: GyroSource,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_SPECTROGRAM_WINDOW,
            overlap_fraction: SPECTROGRAM_OVERLAP_FRACTION,
            gain: DEFAULT_SPECTROGRAM_GAIN,
            time_smoothing: DEFAULT_SPECTROGRAM_TIME_SMOOTHING,
            freq_smoothing: DEFAULT_SPECTROGRAM_FREQ_SMOOTHING,
            max_frequency_hz: None,
            source: GyroSource::Filtered,
        }
    }
}

impl SpectrogramConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        let w = self.window_size;
        if !w.is_power_of_two() || !(SPECTROGRAM_MIN_WINDOW..=SPECTROGRAM_MAX_WINDOW).contains(&w) {
            return Err(AnalysisError::invalid_config(format!(
                "spectrogram window must be a power of two in [{}, {}], got {}",
                SPECTROGRAM_MIN_WINDOW, SPECTROGRAM_MAX_WINDOW, w
            )));
        }
        if !(self.overlap_fraction > 0.0 && self.overlap_fraction < 1.0) {
            return Err(AnalysisError::invalid_config(format!(
                "spectrogram overlap must be in (0, 1), got {}",
                self.overlap_fraction
            )));
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(AnalysisError::invalid_config(format!("spectrogram gain must be positive, got {}", self.gain)));
        }
        for (name, win) in [("time", self.time_smoothing), ("frequency", self.freq_smoothing)] {
            if win == 0 || win % 2 == 0 {
                return Err(AnalysisError::invalid_config(format!(
                    "spectrogram {} smoothing must be odd and >= 1, got {}",
                    name, win
                )));
            }
        }
        if let Some(max) = self.max_frequency_hz {
            if !(max > 0.0) {
                return Err(AnalysisError::invalid_config("spectrogram frequency crop must be positive"));
            }
        }
        Ok(())
    }

    /// Hop between frames in samples.
    pub fn step(&self) -> usize {
        ((self.window_size as f64) * (1.0 - self.overlap_fraction)).round().max(1.0) as usize
    }
}

/// Empirical step-detection and quality-filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepResponseThresholds {
    /// Setpoint change (deg/s) within `edge_interval_s` that marks a step.
    pub edge_threshold: f64,
    pub edge_interval_s: f64,
    pub pre_roll_s: f64,
    pub post_roll_s: f64,
    /// Peak |setpoint| a window needs to count as useful.
    pub min_peak_amplitude: f64,
    pub min_useful_windows: usize,
    /// Split between the low and high setpoint groups.
    pub setpoint_split: f64,
    pub smoothing_window: usize,
    pub steady_state_start_s: f64,
    pub steady_state_end_s: f64,
    /// Accepted range for a window's normalised steady-state mean.
    pub steady_state_min: f64,
    pub steady_state_max: f64,
    pub rise_fraction: f64,
    pub delay_fraction: f64,
    pub settling_tolerance: f64,
}

impl Default for StepResponseThresholds {
    fn default() -> Self {
        Self {
            edge_threshold: MOVEMENT_THRESHOLD_DEG_S,
            edge_interval_s: STEP_EDGE_INTERVAL_S,
            pre_roll_s: STEP_PRE_ROLL_S,
            post_roll_s: RESPONSE_LENGTH_S,
            min_peak_amplitude: STEP_MIN_PEAK_AMPLITUDE,
            min_useful_windows: MIN_USEFUL_STEP_WINDOWS,
            setpoint_split: SETPOINT_THRESHOLD,
            smoothing_window: POST_AVERAGING_SMOOTHING_WINDOW,
            steady_state_start_s: STEADY_STATE_START_S,
            steady_state_end_s: STEADY_STATE_END_S,
            steady_state_min: STEADY_STATE_MIN_VAL,
            steady_state_max: STEADY_STATE_MAX_VAL,
            rise_fraction: RISE_TIME_FRACTION,
            delay_fraction: DELAY_TIME_FRACTION,
            settling_tolerance: SETTLING_TOLERANCE,
        }
    }
}

impl StepResponseThresholds {
    pub fn validate(&self) -> AnalysisResult<()> {
        let positive = [
            ("edge_threshold", self.edge_threshold),
            ("edge_interval_s", self.edge_interval_s),
            ("post_roll_s", self.post_roll_s),
            ("min_peak_amplitude", self.min_peak_amplitude),
            ("setpoint_split", self.setpoint_split),
            ("settling_tolerance", self.settling_tolerance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(AnalysisError::invalid_config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !self.pre_roll_s.is_finite() || self.pre_roll_s < 0.0 {
            return Err(AnalysisError::invalid_config("pre_roll_s must not be negative"));
        }
        if self.smoothing_window == 0 || self.smoothing_window % 2 == 0 {
            return Err(AnalysisError::invalid_config(format!(
                "step response smoothing window must be odd and >= 1, got {}",
                self.smoothing_window
            )));
        }
        if !(self.steady_state_start_s >= 0.0 && self.steady_state_start_s < self.steady_state_end_s) {
            return Err(AnalysisError::invalid_config("steady-state segment must satisfy 0 <= start < end"));
        }
        if !(self.steady_state_min.is_finite() && self.steady_state_max.is_finite())
            || self.steady_state_min >= self.steady_state_max
        {
            return Err(AnalysisError::invalid_config(format!(
                "steady-state band must satisfy min < max, got {}..{}",
                self.steady_state_min, self.steady_state_max
            )));
        }
        for (name, fraction) in [("rise_fraction", self.rise_fraction), ("delay_fraction", self.delay_fraction)] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(AnalysisError::invalid_config(format!("{} must be in (0, 1], got {}", name, fraction)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    pub max_points: usize,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self { max_points: DEFAULT_MAX_POINTS }
    }
}

impl DecimationConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        validate_point_budget(self.max_points)
    }
}

/// A budget must hold at least one min/max pair.
pub fn validate_point_budget(max_points: usize) -> AnalysisResult<()> {
    if max_points < 2 {
        return Err(AnalysisError::invalid_config(format!("decimation budget must be >= 2, got {}", max_points)));
    }
    Ok(())
}

/// Settings for the throttle-vs-frequency noise map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleNoiseConfig {
    pub frame_length_s: f64,
    /// Frames overlapping each sample; the hop is `frame / superposition`.
    pub superposition: usize,
    pub throttle_bins: usize,
    /// Adjacent FFT bins merged into one output frequency bin.
    pub freq_bin_group: usize,
    /// Gaussian sigma along the throttle axis, in bins; 0 disables smoothing.
    pub smoothing_sigma: f64,
    pub gain: f64,
    pub source: GyroSource,
}

impl Default for ThrottleNoiseConfig {
    fn default() -> Self {
        Self {
            frame_length_s: NOISE_FRAME_LENGTH_S,
            superposition: NOISE_SUPERPOSITION,
            throttle_bins: THROTTLE_BINS,
            freq_bin_group: NOISE_FREQ_BIN_GROUP,
            smoothing_sigma: NOISE_SMOOTHING_SIGMA,
            gain: DEFAULT_NOISE_GAIN,
            source: GyroSource::Filtered,
        }
    }
}

impl ThrottleNoiseConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.frame_length_s.is_finite() || self.frame_length_s <= 0.0 {
            return Err(AnalysisError::invalid_config(format!(
                "noise frame length must be positive, got {}",
                self.frame_length_s
            )));
        }
        for (name, value) in [
            ("superposition", self.superposition),
            ("throttle_bins", self.throttle_bins),
            ("freq_bin_group", self.freq_bin_group),
        ] {
            if value == 0 {
                return Err(AnalysisError::invalid_config(format!("noise {} must be >= 1", name)));
            }
        }
        if !self.smoothing_sigma.is_finite() || self.smoothing_sigma < 0.0 {
            return Err(AnalysisError::invalid_config("noise smoothing sigma must not be negative"));
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(AnalysisError::invalid_config(format!("noise gain must be positive, got {}", self.gain)));
        }
        Ok(())
    }
}

/// Settings for the tracking-error histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHistogramConfig {
    /// Samples further than this many standard deviations from the mean are dropped.
    pub outlier_sigma: f64,
    pub bins: usize,
}

impl Default for ErrorHistogramConfig {
    fn default() -> Self {
        Self { outlier_sigma: ERROR_OUTLIER_SIGMA, bins: ERROR_HISTOGRAM_BINS }
    }
}

impl ErrorHistogramConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.outlier_sigma.is_finite() || self.outlier_sigma <= 0.0 {
            return Err(AnalysisError::invalid_config(format!(
                "outlier sigma must be positive, got {}",
                self.outlier_sigma
            )));
        }
        if self.bins == 0 {
            return Err(AnalysisError::invalid_config("error histogram needs at least one bin"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedConfig {
    /// Overrides the header `pidsum_limit` clamp.
    pub actuator_limit: Option<f64>,
    /// D gain in header units, used instead of the header lookup.
    pub d_gain_override: Option<f64>,
}

impl DerivedConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if let Some(limit) = self.actuator_limit {
            if !(limit > 0.0) {
                return Err(AnalysisError::invalid_config(format!("actuator limit must be positive, got {}", limit)));
            }
        }
        if let Some(gain) = self.d_gain_override {
            if !gain.is_finite() || gain < 0.0 {
                return Err(AnalysisError::invalid_config(format!("D gain override must be >= 0, got {}", gain)));
            }
        }
        Ok(())
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub psd: PsdConfig,
    pub spectrogram: SpectrogramConfig,
    pub step_response: StepResponseThresholds,
    pub decimation: DecimationConfig,
    pub derived: DerivedConfig,
    pub throttle_noise: ThrottleNoiseConfig,
    pub error_histogram: ErrorHistogramConfig,
    pub logging: LogConfig,
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> AnalysisResult<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| AnalysisError::invalid_config(format!("invalid JSON configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> AnalysisResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        self.psd.validate()?;
        self.spectrogram.validate()?;
        self.step_response.validate()?;
        self.decimation.validate()?;
        self.throttle_noise.validate()?;
        self.error_histogram.validate()?;
        self.derived.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert_eq!(SpectrogramConfig::default().step(), 512);
    }

    #[test]
    fn test_partial_json_overrides_only_named_fields() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{ "spectrogram": { "window_size": 2048, "gain": 2.5 }, "step_response": { "min_peak_amplitude": 150 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.spectrogram.window_size, 2048);
        assert_eq!(cfg.spectrogram.gain, 2.5);
        assert_eq!(cfg.spectrogram.freq_smoothing, DEFAULT_SPECTROGRAM_FREQ_SMOOTHING);
        assert_eq!(cfg.step_response.min_peak_amplitude, 150.0);
        assert_eq!(cfg.step_response.edge_threshold, MOVEMENT_THRESHOLD_DEG_S);
        assert_eq!(cfg.psd, PsdConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            r#"{ "spectrogram": { "window_size": 1000 } }"#,
            r#"{ "spectrogram": { "window_size": 32768 } }"#,
            r#"{ "spectrogram": { "overlap_fraction": 1.0 } }"#,
            r#"{ "spectrogram": { "time_smoothing": 2 } }"#,
            r#"{ "psd": { "smoothing_window": 4 } }"#,
            r#"{ "step_response": { "min_peak_amplitude": 0 } }"#,
            r#"{ "derived": { "actuator_limit": -1 } }"#,
            r#"{ "decimation": { "max_points": 0 } }"#,
            r#"{ "throttle_noise": { "superposition": 0 } }"#,
            r#"{ "error_histogram": { "outlier_sigma": 0 } }"#,
            r#"{ "step_response": { "steady_state_min": 1.5, "steady_state_max": 0.5 } }"#,
        ];
        for json in bad {
            assert!(
                matches!(AnalysisConfig::from_json_str(json), Err(AnalysisError::InvalidConfig(_))),
                "accepted {}",
                json
            );
        }
    }
}
