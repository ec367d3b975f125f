// src/data_analysis/fft_utils.rs

use std::sync::Arc;

use ndarray::Array1;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use tracing::warn;

/// Number of bins produced by a real FFT of length `n`.
pub fn rfft_len(n: usize) -> usize {
    n / 2 + 1
}

/// Computes the Fast Fourier Transform (FFT) of a real-valued signal.
/// Returns the complex frequency spectrum (`n/2 + 1` bins). Handles empty input.
pub fn fft_forward(data: &Array1<f64>) -> Array1<Complex64> {
    if data.is_empty() {
        return Array1::zeros(0);
    }
    let mut transform = FrameTransform::new(data.len());
    transform.process(data.iter().copied())
}

/// A forward real FFT planned once and reused across equally sized frames.
pub struct FrameTransform {
    plan: Arc<dyn RealToComplex<f64>>,
    input: Vec<f64>,
    output: Vec<Complex64>,
}

impl FrameTransform {
    pub fn new(len: usize) -> Self {
        let plan = RealFftPlanner::<f64>::new().plan_fft_forward(len);
        let input = plan.make_input_vec();
        let output = plan.make_output_vec();
        Self { plan, input, output }
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Transforms one frame. Missing trailing samples are zero-padded.
    pub fn process(&mut self, frame: impl IntoIterator<Item = f64>) -> Array1<Complex64> {
        self.input.iter_mut().for_each(|x| *x = 0.0);
        for (slot, value) in self.input.iter_mut().zip(frame) {
            *slot = value;
        }
        if self.plan.process(&mut self.input, &mut self.output).is_err() {
            warn!(len = self.input.len(), "FFT forward processing failed");
            return Array1::zeros(self.output.len());
        }
        Array1::from(self.output.clone())
    }
}

/// Frequencies (Hz) of the real FFT bins for a transform of length `n`.
pub fn rfft_frequencies(n: usize, sample_rate: f64) -> Array1<f64> {
    if n == 0 || sample_rate <= 0.0 {
        return Array1::zeros(0);
    }
    Array1::from_shape_fn(rfft_len(n), |k| k as f64 * sample_rate / n as f64)
}

/// Makes a Tukey window. `alpha >= 1` yields a Hann window, `alpha <= 0` a rectangle.
pub fn tukeywin(num: usize, alpha: f64) -> Array1<f64> {
    if num <= 1 || alpha <= 0.0 {
        return Array1::ones(num);
    }
    if alpha >= 1.0 {
        let denom = num as f64 - 1.0;
        return Array1::from_shape_fn(num, |i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / denom).cos())
        });
    }
    let mut window = Array1::<f64>::ones(num);
    let n_alpha = ((alpha / 2.0) * (num as f64 - 1.0)).floor() as usize;
    for i in 0..n_alpha {
        window[i] = 0.5 * (1.0 - (std::f64::consts::PI * i as f64 / n_alpha as f64).cos());
        window[num - 1 - i] = window[i];
    }
    window
}

/// Hann window (Tukey with alpha = 1).
pub fn hann_window(num: usize) -> Array1<f64> {
    tukeywin(num, 1.0)
}

/// Doubles one-sided power for every bin except DC and, for even
/// transform lengths, Nyquist.
pub fn apply_one_sided_scaling(power: &mut Array1<f64>, transform_len: usize) {
    let bins = power.len();
    for (k, p) in power.iter_mut().enumerate() {
        let is_nyquist = transform_len % 2 == 0 && k + 1 == bins;
        if k > 0 && !is_nyquist {
            *p *= 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_of_constant_is_dc_only() {
        let data = Array1::from(vec![1.0; 8]);
        let spectrum = fft_forward(&data);
        assert_eq!(spectrum.len(), 5);
        assert!((spectrum[0].re - 8.0).abs() < 1e-12);
        for bin in spectrum.iter().skip(1) {
            assert!(bin.norm() < 1e-12);
        }
    }

    #[test]
    fn test_rfft_frequencies() {
        let freqs = rfft_frequencies(8, 1000.0);
        assert_eq!(freqs.len(), 5);
        assert!((freqs[1] - 125.0).abs() < 1e-12);
        assert!((freqs[4] - 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_hann_window_endpoints() {
        let w = hann_window(5);
        assert!(w[0].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
    }

    #[test]
    fn test_tukey_tapers_from_zero() {
        let w = tukeywin(11, 0.5);
        assert!(w[0].abs() < 1e-12);
        assert!((w[1] - 0.5).abs() < 1e-12);
        assert_eq!(w[5], 1.0);
        assert!(w[10].abs() < 1e-12);
    }

    #[test]
    fn test_frame_transform_zero_pads() {
        let mut transform = FrameTransform::new(4);
        let spectrum = transform.process([1.0, 1.0]);
        assert!((spectrum[0].re - 2.0).abs() < 1e-12);
    }
}
