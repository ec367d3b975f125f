// src/lib.rs - Library interface for the analysis engine

pub mod axis_names;
pub mod config;
pub mod constants;
pub mod data_analysis;
pub mod data_input;
pub mod error;
pub mod logging;
pub mod session;
pub mod signal_table;
pub mod spectrogram_cache;

pub use axis_names::Axis;
pub use config::AnalysisConfig;
pub use data_analysis::calc_step_response::{compute_step_response, StepResponseResult};
pub use data_analysis::decimate::decimate;
pub use data_analysis::derived_signals::compute_derived;
pub use data_analysis::error_histogram::{compute_error_histograms, ErrorHistogramSet};
pub use data_analysis::spectral_analysis::{compute_psd, SpectralResult};
pub use data_analysis::spectrogram::{compute_spectrogram, SpectrogramResult};
pub use data_analysis::throttle_noise::{compute_throttle_noise, ThrottleNoiseResult};
pub use error::{AnalysisError, AnalysisResult, SchemaError};
pub use session::{AnalysisKind, AnalysisOutput, AnalysisRequest, LogHandle, LogId, Workspace};
pub use signal_table::{load, SignalKey, SignalSeries, SignalTable};

pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
