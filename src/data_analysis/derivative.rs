// src/data_analysis/derivative.rs

use ndarray::Array1;

use crate::error::{AnalysisError, AnalysisResult};

/// Discrete derivative of a uniformly sampled series, matching the
/// firmware's two-sample D-term look-back.
///
/// `d[0] = 0`, `d[1] = (x[1] - x[0]) * fs`, `d[i] = (x[i] - x[i-2]) * fs`.
pub fn calculate_derivative(data: &Array1<f64>, sample_rate: f64) -> AnalysisResult<Array1<f64>> {
    if data.len() < 2 {
        return Err(AnalysisError::InsufficientSamples { required: 2, available: data.len() });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(AnalysisError::invalid_config(format!("sample rate must be positive, got {}", sample_rate)));
    }

    let fs = sample_rate;
    let mut derivative = Array1::<f64>::zeros(data.len());
    derivative[1] = (data[1] - data[0]) * fs;
    for i in 2..data.len() {
        derivative[i] = (data[i] - data[i - 2]) * fs;
    }
    Ok(derivative)
}
