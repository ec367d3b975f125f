// src/error.rs

//! Error taxonomy for the analysis engine.
//!
//! Every failure is local to one (log, analysis) request. Data conditions such
//! as "not enough samples" are ordinary results for the caller to surface;
//! `ShapeMismatch` is the only variant that indicates a defect.

use std::io;
use thiserror::Error;

use crate::session::LogId;
use crate::signal_table::SignalKey;

/// Result type for engine operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Canonical signals that could not be resolved from a log's raw columns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unresolved signals: {}", format_keys(.missing))]
pub struct SchemaError {
    /// Sorted, deduplicated list of unresolved canonical keys.
    pub missing: Vec<SignalKey>,
}

impl SchemaError {
    pub fn new(mut missing: Vec<SignalKey>) -> Self {
        missing.sort();
        missing.dedup();
        Self { missing }
    }
}

fn format_keys(keys: &[SignalKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur while loading or analysing a log
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Required canonical signals are not present in the raw columns
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An input series needed by a computation is absent from the table
    #[error("missing signal: {0}")]
    MissingSignal(SignalKey),

    /// Two series that must share a time base do not
    #[error("shape mismatch in {context}: expected {expected} samples, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Series too short for the requested transform
    #[error("insufficient samples: need at least {required}, have {available}")]
    InsufficientSamples { required: usize, available: usize },

    /// Caller-supplied parameter out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Work abandoned because the owning log was unloaded or replaced
    #[error("analysis cancelled: log was unloaded or replaced")]
    Cancelled,

    /// Handle does not refer to a loaded log
    #[error("no loaded log with id {0}")]
    UnknownLog(LogId),

    /// Failed to read a decoded log file
    #[error("failed to read decoded log: {0}")]
    Io(#[from] io::Error),

    /// Malformed decoded CSV
    #[error("malformed decoded CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    /// Data conditions the caller can report and move on from. Everything else
    /// is an ingestion failure or an internal defect.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Schema(_)
                | AnalysisError::MissingSignal(_)
                | AnalysisError::InsufficientSamples { .. }
                | AnalysisError::Cancelled
        )
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidConfig(msg.into())
    }
}
