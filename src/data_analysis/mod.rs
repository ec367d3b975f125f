// src/data_analysis/mod.rs

pub mod calc_step_response;
pub mod decimate;
pub mod derivative;
pub mod derived_signals;
pub mod error_histogram;
pub mod fft_utils;
pub mod smoothing;
pub mod spectral_analysis;
pub mod spectrogram;
pub mod throttle_noise;

// src/data_analysis/mod.rs
