// src/constants.rs

// --- Time base ---
// Time columns without a unit suffix are classified by magnitude.
pub const TIME_MICROSECONDS_THRESHOLD: f64 = 1_000_000.0;
pub const TIME_MILLISECONDS_THRESHOLD: f64 = 1_000.0;
pub const MIN_TIME_DELTA_S: f64 = 1e-9;

// --- Betaflight PID scaling conventions (pid.h) ---
pub const PTERM_SCALE: f64 = 0.032029;
pub const ITERM_SCALE: f64 = 0.244381;
pub const DTERM_SCALE: f64 = 0.000529;

// D gain (header units) assumed when no header key carries one.
pub const DEFAULT_D_GAIN: f64 = 30.0;
// Default clamp for the combined PID output (firmware pidsum_limit).
pub const DEFAULT_ACTUATOR_LIMIT: f64 = 500.0;

// --- Power spectral density ---
pub const PSD_MIN_SAMPLES: usize = 256;
pub const PSD_ZOOM_MAX_FREQ_HZ: f64 = 100.0;
pub const DEFAULT_PSD_SMOOTHING_WINDOW: usize = 5;

// --- Spectrogram ---
pub const SPECTROGRAM_MIN_WINDOW: usize = 1 << 8;
pub const SPECTROGRAM_MAX_WINDOW: usize = 1 << 14;
pub const DEFAULT_SPECTROGRAM_WINDOW: usize = 1024;
pub const SPECTROGRAM_OVERLAP_FRACTION: f64 = 0.5;
pub const DEFAULT_SPECTROGRAM_GAIN: f64 = 1.0;
pub const DEFAULT_SPECTROGRAM_TIME_SMOOTHING: usize = 1;
pub const DEFAULT_SPECTROGRAM_FREQ_SMOOTHING: usize = 3;
// Floor applied before the dB conversion so silent frames stay finite.
pub const SPECTROGRAM_MIN_POWER_DB: f64 = -100.0;

// --- Step response ---
// Setpoint change that marks a step edge, and the interval it must occur within.
pub const MOVEMENT_THRESHOLD_DEG_S: f64 = 20.0;
pub const STEP_EDGE_INTERVAL_S: f64 = 0.01;
// Window extent around each detected onset.
pub const STEP_PRE_ROLL_S: f64 = 0.02;
pub const RESPONSE_LENGTH_S: f64 = 0.5;
// Peak |setpoint| a window needs before it counts as useful.
pub const STEP_MIN_PEAK_AMPLITUDE: f64 = 100.0;
// Step size below which a window cannot be normalised.
pub const STEP_MIN_NORMALIZING_DELTA: f64 = 1e-6;
// Fewer useful windows than this flags the result as insufficient.
pub const MIN_USEFUL_STEP_WINDOWS: usize = 100;
// Low/high setpoint split for the grouped curves.
pub const SETPOINT_THRESHOLD: f64 = 500.0;

// Constant for post-averaging smoothing of the step response curves.
pub const POST_AVERAGING_SMOOTHING_WINDOW: usize = 5;

// Steady-state segment (seconds after onset) used as the final value.
pub const STEADY_STATE_START_S: f64 = 0.2;
pub const STEADY_STATE_END_S: f64 = 0.5;
// Band the normalised steady-state mean of a single window must fall in.
// Stick reversals inside the post-roll land far outside it.
pub const STEADY_STATE_MIN_VAL: f64 = 0.5;
pub const STEADY_STATE_MAX_VAL: f64 = 1.5;

pub const RISE_TIME_FRACTION: f64 = 0.9;
pub const DELAY_TIME_FRACTION: f64 = 0.5;
pub const SETTLING_TOLERANCE: f64 = 0.05;

// --- Decimation ---
pub const DEFAULT_MAX_POINTS: usize = 4000;

// --- Throttle noise map ---
// Frame length and how many frames overlap any one sample.
pub const NOISE_FRAME_LENGTH_S: f64 = 0.3;
pub const NOISE_SUPERPOSITION: usize = 16;
// Spectra are zero-padded to a multiple of this length.
pub const NOISE_FFT_BLOCK: usize = 1024;
pub const THROTTLE_BINS: usize = 101;
pub const THROTTLE_MAX_PERCENT: f64 = 100.0;
// Raw rcCommand throttle above this is treated as 1000..2000 PWM.
pub const THROTTLE_PWM_DETECT: f64 = 500.0;
pub const THROTTLE_PWM_MIN: f64 = 1000.0;
// Frequency bins are merged in groups of this size.
pub const NOISE_FREQ_BIN_GROUP: usize = 4;
// Gaussian sigma (throttle bins) for smoothing along the throttle axis.
pub const NOISE_SMOOTHING_SIGMA: f64 = 3.0;
pub const DEFAULT_NOISE_GAIN: f64 = 1.0;

// --- Error histogram ---
pub const ERROR_OUTLIER_SIGMA: f64 = 3.0;
pub const ERROR_HISTOGRAM_BINS: usize = 50;
// Symmetric range used when no axis has tracking error data.
pub const DEFAULT_ERROR_RANGE: f64 = 50.0;

// src/constants.rs
