// src/session.rs

//! Loaded-log workspace and batch execution.
//!
//! Each loaded log gets a [`LogHandle`] carrying a generation number. Replacing
//! or unloading a log bumps the generation, trips the log's [`CancelToken`] and
//! drops its spectrogram cache; work that finishes for an outdated handle is
//! discarded instead of being returned.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axis_names::Axis;
use crate::config::{validate_point_budget, AnalysisConfig, SpectrogramConfig};
use crate::data_analysis::calc_step_response::{compute_step_response, StepResponseResult};
use crate::data_analysis::decimate::decimate;
use crate::data_analysis::derived_signals::{compute_derived_with, DerivedSeries};
use crate::data_analysis::error_histogram::{compute_error_histograms, ErrorHistogramSet};
use crate::data_analysis::spectral_analysis::{compute_psd_with, SpectralResult};
use crate::data_analysis::spectrogram::{compute_spectrogram_with, SpectrogramResult};
use crate::data_analysis::throttle_noise::{compute_throttle_noise_with, ThrottleNoiseResult};
use crate::data_input::raw_table::{RawHeader, RawTable};
use crate::error::{AnalysisError, AnalysisResult};
use crate::signal_table::{self, SignalKey, SignalSeries, SignalTable};
use crate::spectrogram_cache::{SpectrogramCache, SpectrogramKey};

/// Identifier of a loaded log, stable across replacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogId(u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log-{}", self.0)
    }
}

/// A log id plus the generation of the table it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogHandle {
    pub id: LogId,
    pub generation: u64,
}

/// Cooperative cancellation flag shared between a log and its in-flight work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct LoadedLog {
    generation: u64,
    table: Arc<SignalTable>,
    cache: Arc<SpectrogramCache>,
    cancel: CancelToken,
}

impl LoadedLog {
    fn invalidate(&self) {
        self.cancel.cancel();
        self.cache.clear();
    }
}

/// What to compute for one log.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisKind {
    /// Full and zoomed PSD with the workspace PSD settings.
    Psd { axis: Axis },
    /// Spectrogram with explicit settings; results are cached per log.
    Spectrogram { axis: Axis, config: SpectrogramConfig },
    StepResponse { axes: Vec<Axis> },
    Derived { keys: Vec<SignalKey> },
    /// Down-sampled copy of one stored series; `None` uses the configured budget.
    Decimate { key: SignalKey, max_points: Option<usize> },
    /// Gyro noise against throttle with the workspace settings.
    ThrottleNoise { axis: Axis },
    ErrorHistogram { axes: Vec<Axis> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub handle: LogHandle,
    pub kind: AnalysisKind,
}

impl AnalysisRequest {
    pub fn new(handle: LogHandle, kind: AnalysisKind) -> Self {
        Self { handle, kind }
    }
}

#[derive(Debug)]
pub enum AnalysisOutput {
    Psd { full: SpectralResult, zoomed: SpectralResult },
    Spectrogram(Arc<SpectrogramResult>),
    /// One entry per requested axis; an axis without its inputs fails alone.
    StepResponse(BTreeMap<Axis, AnalysisResult<StepResponseResult>>),
    Derived(BTreeMap<SignalKey, DerivedSeries>),
    Decimated(SignalSeries),
    ThrottleNoise(ThrottleNoiseResult),
    ErrorHistograms(ErrorHistogramSet),
}

/// Owns every loaded log and runs analyses against them.
pub struct Workspace {
    config: AnalysisConfig,
    logs: RwLock<HashMap<LogId, LoadedLog>>,
    next_id: AtomicU64,
    next_generation: AtomicU64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Workspace {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            logs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn fresh_log(&self, table: SignalTable) -> LoadedLog {
        LoadedLog {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            table: Arc::new(table),
            cache: Arc::new(SpectrogramCache::new()),
            cancel: CancelToken::default(),
        }
    }

    /// Adds an already built table.
    pub fn insert(&self, table: SignalTable) -> LogHandle {
        let id = LogId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let log = self.fresh_log(table);
        let handle = LogHandle { id, generation: log.generation };
        self.logs.write().unwrap_or_else(|e| e.into_inner()).insert(id, log);
        info!(log = %id, "Log loaded");
        handle
    }

    /// Resolves and loads a decoded log.
    pub fn load(&self, raw_table: &RawTable, raw_header: &RawHeader) -> AnalysisResult<LogHandle> {
        let table = signal_table::load(raw_table, raw_header)?;
        Ok(self.insert(table))
    }

    /// Swaps the table behind `id`. Handles issued before the swap go stale.
    pub fn replace(&self, id: LogId, table: SignalTable) -> AnalysisResult<LogHandle> {
        let log = self.fresh_log(table);
        let handle = LogHandle { id, generation: log.generation };
        let mut logs = self.logs.write().unwrap_or_else(|e| e.into_inner());
        let slot = logs.get_mut(&id).ok_or(AnalysisError::UnknownLog(id))?;
        slot.invalidate();
        *slot = log;
        info!(log = %id, generation = handle.generation, "Log replaced");
        Ok(handle)
    }

    /// Removes a log, cancelling its in-flight work and dropping its cache.
    pub fn unload(&self, id: LogId) -> AnalysisResult<()> {
        let removed = self.logs.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        let log = removed.ok_or(AnalysisError::UnknownLog(id))?;
        log.invalidate();
        info!(log = %id, "Log unloaded");
        Ok(())
    }

    pub fn handles(&self) -> Vec<LogHandle> {
        let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
        let mut handles: Vec<LogHandle> = logs
            .iter()
            .map(|(&id, log)| LogHandle { id, generation: log.generation })
            .collect();
        handles.sort_by_key(|h| h.id);
        handles
    }

    pub fn is_current(&self, handle: LogHandle) -> bool {
        let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
        logs.get(&handle.id).is_some_and(|log| log.generation == handle.generation)
    }

    fn snapshot(&self, handle: LogHandle) -> AnalysisResult<(Arc<SignalTable>, Arc<SpectrogramCache>, CancelToken)> {
        let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
        let log = logs.get(&handle.id).ok_or(AnalysisError::UnknownLog(handle.id))?;
        if log.generation != handle.generation {
            return Err(AnalysisError::Cancelled);
        }
        Ok((Arc::clone(&log.table), Arc::clone(&log.cache), log.cancel.clone()))
    }

    /// The table behind a current handle.
    pub fn table(&self, handle: LogHandle) -> AnalysisResult<Arc<SignalTable>> {
        self.snapshot(handle).map(|(table, _, _)| table)
    }

    /// Cached spectrogram count for a current handle.
    pub fn cached_spectrograms(&self, handle: LogHandle) -> AnalysisResult<usize> {
        self.snapshot(handle).map(|(_, cache, _)| cache.len())
    }

    /// Runs one request. A result produced for a handle that went stale while
    /// computing is replaced by `Cancelled`.
    pub fn run(&self, request: &AnalysisRequest) -> AnalysisResult<AnalysisOutput> {
        let (table, cache, cancel) = self.snapshot(request.handle)?;
        let output = self.execute(&table, &cache, &cancel, &request.kind);

        if cancel.is_cancelled() || !self.is_current(request.handle) {
            debug!(log = %request.handle.id, "Discarding result for stale handle");
            return Err(AnalysisError::Cancelled);
        }
        if let Err(e) = &output {
            if e.is_recoverable() {
                debug!(log = %request.handle.id, error = %e, "Analysis request failed");
            } else {
                warn!(log = %request.handle.id, error = %e, "Analysis request failed");
            }
        }
        output
    }

    /// Runs independent requests on the rayon pool. Results are returned in
    /// request order; one failure never affects the others.
    pub fn run_batch(&self, requests: &[AnalysisRequest]) -> Vec<AnalysisResult<AnalysisOutput>> {
        info!(requests = requests.len(), "Running analysis batch");
        requests.par_iter().map(|request| self.run(request)).collect()
    }

    fn execute(
        &self,
        table: &SignalTable,
        cache: &SpectrogramCache,
        cancel: &CancelToken,
        kind: &AnalysisKind,
    ) -> AnalysisResult<AnalysisOutput> {
        match kind {
            AnalysisKind::Psd { axis } => {
                let (full, zoomed) = compute_psd_with(table, *axis, &self.config.psd)?;
                Ok(AnalysisOutput::Psd { full, zoomed })
            }
            AnalysisKind::Spectrogram { axis, config } => {
                let key = SpectrogramKey::new(*axis, config);
                let result = cache.get_or_compute(key, || compute_spectrogram_with(table, *axis, config, cancel))?;
                Ok(AnalysisOutput::Spectrogram(result))
            }
            AnalysisKind::StepResponse { axes } => {
                compute_step_response(table, axes, &self.config.step_response).map(AnalysisOutput::StepResponse)
            }
            AnalysisKind::Derived { keys } => {
                compute_derived_with(table, keys, &self.config.derived).map(AnalysisOutput::Derived)
            }
            AnalysisKind::Decimate { key, max_points } => {
                let series = table.get(key)?;
                let budget = max_points.unwrap_or(self.config.decimation.max_points);
                validate_point_budget(budget)?;
                Ok(AnalysisOutput::Decimated(decimate(series, budget)))
            }
            AnalysisKind::ThrottleNoise { axis } => {
                compute_throttle_noise_with(table, *axis, &self.config.throttle_noise, cancel)
                    .map(AnalysisOutput::ThrottleNoise)
            }
            AnalysisKind::ErrorHistogram { axes } => {
                compute_error_histograms(table, axes, &self.config.error_histogram).map(AnalysisOutput::ErrorHistograms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_input::header_params::HeaderParams;
    use std::f64::consts::PI;

    fn table(n: usize, freq: f64) -> SignalTable {
        let fs = 1000.0;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let gyro: Vec<f64> = (0..n).map(|i| 50.0 * (2.0 * PI * freq * i as f64 / fs).sin()).collect();
        let columns = Axis::ALL
            .iter()
            .map(|&axis| (SignalKey::gyro_filtered(axis), gyro.clone()))
            .collect();
        SignalTable::from_columns(time, columns, HeaderParams::default()).unwrap()
    }

    #[test]
    fn test_batch_failures_stay_local() {
        let ws = Workspace::default();
        let handle = ws.insert(table(4096, 40.0));
        let requests = vec![
            AnalysisRequest::new(handle, AnalysisKind::Psd { axis: Axis::Roll }),
            AnalysisRequest::new(handle, AnalysisKind::Derived { keys: vec![SignalKey::TrackingError(Axis::Roll)] }),
            AnalysisRequest::new(handle, AnalysisKind::Psd { axis: Axis::Yaw }),
        ];
        let results = ws.run_batch(&requests);
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Ok(AnalysisOutput::Psd { .. })));
        assert!(matches!(results[1], Err(AnalysisError::MissingSignal(_))));
        assert!(matches!(results[2], Ok(AnalysisOutput::Psd { .. })));
    }

    #[test]
    fn test_spectrogram_is_cached_per_log() {
        let ws = Workspace::default();
        let handle = ws.insert(table(4096, 40.0));
        let request = AnalysisRequest::new(
            handle,
            AnalysisKind::Spectrogram { axis: Axis::Pitch, config: SpectrogramConfig::default() },
        );
        let first = match ws.run(&request).unwrap() {
            AnalysisOutput::Spectrogram(r) => r,
            other => panic!("unexpected output {:?}", other),
        };
        let second = match ws.run(&request).unwrap() {
            AnalysisOutput::Spectrogram(r) => r,
            other => panic!("unexpected output {:?}", other),
        };
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ws.cached_spectrograms(handle).unwrap(), 1);
    }

    #[test]
    fn test_replace_makes_old_handle_stale() {
        let ws = Workspace::default();
        let old = ws.insert(table(4096, 40.0));
        let new = ws.replace(old.id, table(2048, 80.0)).unwrap();
        assert_eq!(old.id, new.id);
        assert!(!ws.is_current(old));
        assert!(ws.is_current(new));
        let stale = ws.run(&AnalysisRequest::new(old, AnalysisKind::Psd { axis: Axis::Roll }));
        assert!(matches!(stale, Err(AnalysisError::Cancelled)));
        assert_eq!(ws.table(new).unwrap().row_count, 2048);
    }

    #[test]
    fn test_unload_leaves_other_logs_alone() {
        let ws = Workspace::default();
        let a = ws.insert(table(4096, 40.0));
        let b = ws.insert(table(4096, 60.0));
        let spectrogram = |h| AnalysisRequest::new(
            h,
            AnalysisKind::Spectrogram { axis: Axis::Roll, config: SpectrogramConfig::default() },
        );
        ws.run(&spectrogram(a)).unwrap();
        ws.run(&spectrogram(b)).unwrap();

        ws.unload(a.id).unwrap();
        assert!(matches!(ws.table(a), Err(AnalysisError::UnknownLog(id)) if id == a.id));
        assert!(matches!(ws.unload(a.id), Err(AnalysisError::UnknownLog(_))));
        assert_eq!(ws.cached_spectrograms(b).unwrap(), 1);
        assert_eq!(ws.handles(), vec![b]);
    }

    #[test]
    fn test_step_response_axes_fail_independently() {
        let ws = Workspace::default();
        let handle = ws.insert(table(4096, 40.0));
        let out = ws
            .run(&AnalysisRequest::new(handle, AnalysisKind::StepResponse { axes: vec![Axis::Roll, Axis::Pitch] }))
            .unwrap();
        match out {
            AnalysisOutput::StepResponse(per_axis) => {
                assert_eq!(per_axis.len(), 2);
                assert!(matches!(
                    per_axis[&Axis::Roll],
                    Err(AnalysisError::MissingSignal(SignalKey::Setpoint(Axis::Roll)))
                ));
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_throttle_noise_and_error_histogram_requests() {
        let ws = Workspace::default();
        let n = 4096;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / 1000.0).collect();
        let gyro: Vec<f64> = (0..n).map(|i| 10.0 * (2.0 * PI * 90.0 * i as f64 / 1000.0).sin()).collect();
        let table = SignalTable::from_columns(
            time,
            vec![
                (SignalKey::gyro_filtered(Axis::Roll), gyro),
                (SignalKey::Setpoint(Axis::Roll), vec![0.0; n]),
                (SignalKey::Throttle, vec![1500.0; n]),
            ],
            HeaderParams::default(),
        )
        .unwrap();
        let handle = ws.insert(table);
        let results = ws.run_batch(&[
            AnalysisRequest::new(handle, AnalysisKind::ThrottleNoise { axis: Axis::Roll }),
            AnalysisRequest::new(handle, AnalysisKind::ThrottleNoise { axis: Axis::Yaw }),
            AnalysisRequest::new(handle, AnalysisKind::ErrorHistogram { axes: vec![Axis::Roll, Axis::Pitch] }),
        ]);
        match &results[0] {
            Ok(AnalysisOutput::ThrottleNoise(noise)) => assert_eq!(noise.throttle_counts[50], noise.frame_count),
            other => panic!("unexpected output {:?}", other),
        }
        assert!(matches!(results[1], Err(AnalysisError::MissingSignal(_))));
        match &results[2] {
            Ok(AnalysisOutput::ErrorHistograms(set)) => {
                assert_eq!(set.skipped, vec![Axis::Pitch]);
                assert!((set.range.1 + set.range.0).abs() < 1e-12);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::default();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_decimate_request() {
        let ws = Workspace::default();
        let handle = ws.insert(table(10_000, 5.0));
        let out = ws
            .run(&AnalysisRequest::new(
                handle,
                AnalysisKind::Decimate { key: SignalKey::gyro_filtered(Axis::Roll), max_points: Some(500) },
            ))
            .unwrap();
        match out {
            AnalysisOutput::Decimated(series) => assert!(series.len() <= 500),
            other => panic!("unexpected output {:?}", other),
        }
        let out = ws
            .run(&AnalysisRequest::new(
                handle,
                AnalysisKind::Decimate { key: SignalKey::gyro_filtered(Axis::Roll), max_points: None },
            ))
            .unwrap();
        match out {
            AnalysisOutput::Decimated(series) => assert!(series.len() <= ws.config().decimation.max_points),
            other => panic!("unexpected output {:?}", other),
        }
        let zero = ws.run(&AnalysisRequest::new(
            handle,
            AnalysisKind::Decimate { key: SignalKey::gyro_filtered(Axis::Roll), max_points: Some(0) },
        ));
        assert!(matches!(zero, Err(AnalysisError::InvalidConfig(_))));
    }
}
