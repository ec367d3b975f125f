// src/data_analysis/derived_signals.rs

//! Pure transforms that build new series from a [`SignalTable`]: unfiltered
//! D-term, tracking error, I-term, combined PID output and cumulative error.
//!
//! A missing input is reported as `MissingSignal` and never replaced by
//! zeros, so callers can tell "no data" from "zero-valued data".

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::Zip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axis_names::Axis;
use crate::config::DerivedConfig;
use crate::constants::{DTERM_SCALE, ITERM_SCALE};
use crate::data_analysis::derivative::calculate_derivative;
use crate::data_input::header_params::{GainLookup, GainSource};
use crate::error::{AnalysisError, AnalysisResult};
use crate::signal_table::{SignalKey, SignalSeries, SignalTable};

/// How a derived series was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    /// Copied from a logged column.
    Logged,
    /// Rebuilt from other signals with a header gain (already scaled to term units).
    Reconstructed { gain: f64, gain_source: GainSource },
    /// Computed from other signals without any gain.
    Computed,
}

/// A derived series plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSeries {
    pub series: SignalSeries,
    pub provenance: Provenance,
    /// Samples clamped to the actuator limit (PID output only).
    pub clamped_samples: Option<usize>,
}

impl DerivedSeries {
    fn computed(series: SignalSeries) -> Self {
        Self { series, provenance: Provenance::Computed, clamped_samples: None }
    }
}

fn check_same_length(context: &'static str, a: &SignalSeries, b: &SignalSeries) -> AnalysisResult<()> {
    if a.len() != b.len() {
        return Err(AnalysisError::ShapeMismatch { context, expected: a.len(), actual: b.len() });
    }
    Ok(())
}

/// Differentiates the raw gyro series and multiplies by `d_gain`.
/// The first sample is 0; requires at least two samples.
pub fn unfiltered_d_term(
    axis: Axis,
    raw_gyro: &SignalSeries,
    d_gain: f64,
    sample_rate: f64,
) -> AnalysisResult<SignalSeries> {
    let derivative = calculate_derivative(&raw_gyro.values, sample_rate)?;
    SignalSeries::new(SignalKey::DTermUnfiltered(axis), Arc::clone(&raw_gyro.time), derivative * d_gain)
}

/// Elementwise `setpoint - actual`.
pub fn tracking_error(axis: Axis, setpoint: &SignalSeries, actual: &SignalSeries) -> AnalysisResult<SignalSeries> {
    check_same_length("tracking error", setpoint, actual)?;
    SignalSeries::new(
        SignalKey::TrackingError(axis),
        Arc::clone(&setpoint.time),
        &setpoint.values - &actual.values,
    )
}

/// Running sum of a tracking-error series.
pub fn cumulative_error(axis: Axis, error: &SignalSeries) -> AnalysisResult<SignalSeries> {
    let mut running = 0.0;
    let values = error.values.mapv(|e| {
        running += e;
        running
    });
    SignalSeries::new(SignalKey::CumulativeError(axis), Arc::clone(&error.time), values)
}

/// Elementwise `p + i + d`, clamped to `[-actuator_limit, actuator_limit]`.
/// Returns the clamped series and how many samples hit the limit.
pub fn pid_output(
    axis: Axis,
    p_term: &SignalSeries,
    i_term: &SignalSeries,
    d_term: &SignalSeries,
    actuator_limit: f64,
) -> AnalysisResult<(SignalSeries, usize)> {
    check_same_length("pid output (I)", p_term, i_term)?;
    check_same_length("pid output (D)", p_term, d_term)?;
    if !(actuator_limit > 0.0) {
        return Err(AnalysisError::invalid_config(format!(
            "actuator limit must be positive, got {}",
            actuator_limit
        )));
    }

    let mut clamped = 0usize;
    let values = Zip::from(&p_term.values)
        .and(&i_term.values)
        .and(&d_term.values)
        .map_collect(|&p, &i, &d| {
            let sum = p + i + d;
            if sum.abs() > actuator_limit {
                clamped += 1;
            }
            sum.clamp(-actuator_limit, actuator_limit)
        });
    let series = SignalSeries::new(SignalKey::PidOutput(axis), Arc::clone(&p_term.time), values)?;
    Ok((series, clamped))
}

/// I-term as logged, or rebuilt by accumulating `error * I_gain * dt`.
pub fn i_term(table: &SignalTable, axis: Axis) -> AnalysisResult<DerivedSeries> {
    if let Ok(logged) = table.get(&SignalKey::ITerm(axis)) {
        return Ok(DerivedSeries {
            series: logged.clone(),
            provenance: Provenance::Logged,
            clamped_samples: None,
        });
    }

    let GainLookup { value, source } = table
        .header()
        .i_gain(axis)
        .ok_or(AnalysisError::MissingSignal(SignalKey::ITerm(axis)))?;
    let error = table_tracking_error(table, axis)?;
    let dt = table.sample_interval()?;
    let gain = value * ITERM_SCALE;

    let mut running = 0.0;
    let values = error.values.mapv(|e| {
        running += e * gain * dt;
        running
    });
    debug!(axis = %axis, gain, "Reconstructed I-term from tracking error");
    Ok(DerivedSeries {
        series: SignalSeries::new(SignalKey::ITerm(axis), Arc::clone(&error.time), values)?,
        provenance: Provenance::Reconstructed { gain, gain_source: source },
        clamped_samples: None,
    })
}

fn table_tracking_error(table: &SignalTable, axis: Axis) -> AnalysisResult<SignalSeries> {
    let setpoint = table.get(&SignalKey::Setpoint(axis))?;
    let gyro = table.get(&SignalKey::gyro_filtered(axis))?;
    tracking_error(axis, setpoint, gyro)
}

fn compute_one(table: &SignalTable, key: SignalKey, config: &DerivedConfig) -> AnalysisResult<DerivedSeries> {
    match key {
        SignalKey::DTermUnfiltered(axis) => {
            let raw = table.get(&SignalKey::gyro_raw(axis))?;
            table.sample_interval()?;
            let lookup = match config.d_gain_override {
                Some(value) => GainLookup { value, source: GainSource::Header("override".to_string()) },
                None => table.header().d_gain(axis),
            };
            if lookup.is_fallback() {
                warn!(axis = %axis, d_gain = lookup.value, "Unfiltered D-term uses fallback D gain");
            }
            let gain = lookup.value * DTERM_SCALE;
            let series = unfiltered_d_term(axis, raw, gain, table.sample_rate_hz)?;
            Ok(DerivedSeries {
                series,
                provenance: Provenance::Reconstructed { gain, gain_source: lookup.source },
                clamped_samples: None,
            })
        }
        SignalKey::TrackingError(axis) => table_tracking_error(table, axis).map(DerivedSeries::computed),
        SignalKey::CumulativeError(axis) => {
            let error = table_tracking_error(table, axis)?;
            cumulative_error(axis, &error).map(DerivedSeries::computed)
        }
        SignalKey::ITerm(axis) => i_term(table, axis),
        SignalKey::PidOutput(axis) => {
            let p = table.get(&SignalKey::PTerm(axis))?;
            let d = table.get(&SignalKey::DTerm(axis))?;
            let i = i_term(table, axis)?;
            let limit = config
                .actuator_limit
                .unwrap_or_else(|| table.header().actuator_limit(axis));
            let (series, clamped) = pid_output(axis, p, &i.series, d, limit)?;
            if clamped > 0 {
                info!(axis = %axis, clamped, limit, "PID output hit the actuator limit");
            }
            Ok(DerivedSeries { series, provenance: Provenance::Computed, clamped_samples: Some(clamped) })
        }
        other => Err(AnalysisError::invalid_config(format!("{} is not a derived signal", other))),
    }
}

/// Computes every requested derived signal with default settings.
pub fn compute_derived(table: &SignalTable, which: &[SignalKey]) -> AnalysisResult<BTreeMap<SignalKey, DerivedSeries>> {
    compute_derived_with(table, which, &DerivedConfig::default())
}

/// Computes every requested derived signal. The first failing key aborts the request.
pub fn compute_derived_with(
    table: &SignalTable,
    which: &[SignalKey],
    config: &DerivedConfig,
) -> AnalysisResult<BTreeMap<SignalKey, DerivedSeries>> {
    config.validate()?;
    let mut out = BTreeMap::new();
    for &key in which {
        if out.contains_key(&key) {
            continue;
        }
        out.insert(key, compute_one(table, key, config)?);
    }
    Ok(out)
}
