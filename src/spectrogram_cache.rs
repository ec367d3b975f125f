// src/spectrogram_cache.rs

//! Per-log memo of spectrogram results.
//!
//! Readers share the map through an `RwLock`; each key owns a slot behind its
//! own `Mutex`, so at most one computation per key runs at a time while other
//! keys proceed in parallel. Failed computations are not stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::axis_names::Axis;
use crate::config::SpectrogramConfig;
use crate::data_analysis::spectrogram::SpectrogramResult;
use crate::error::AnalysisResult;
use crate::signal_table::GyroSource;

/// Every parameter that changes the spectrogram of one axis. Floats are
/// compared by bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpectrogramKey {
    pub axis: Axis,
    pub source: GyroSource,
    pub window_size: usize,
    gain_bits: u64,
    overlap_bits: u64,
    pub time_smoothing: usize,
    pub freq_smoothing: usize,
    max_frequency_bits: Option<u64>,
}

impl SpectrogramKey {
    pub fn new(axis: Axis, config: &SpectrogramConfig) -> Self {
        Self {
            axis,
            source: config.source,
            window_size: config.window_size,
            gain_bits: config.gain.to_bits(),
            overlap_bits: config.overlap_fraction.to_bits(),
            time_smoothing: config.time_smoothing,
            freq_smoothing: config.freq_smoothing,
            max_frequency_bits: config.max_frequency_hz.map(f64::to_bits),
        }
    }

    pub fn gain(&self) -> f64 {
        f64::from_bits(self.gain_bits)
    }
}

type Slot = Arc<Mutex<Option<Arc<SpectrogramResult>>>>;

#[derive(Debug, Default)]
pub struct SpectrogramCache {
    slots: RwLock<HashMap<SpectrogramKey, Slot>>,
}

impl SpectrogramCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &SpectrogramKey) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(key) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(*key).or_default())
    }

    /// Cached result for `key`, if one has been stored.
    pub fn get(&self, key: &SpectrogramKey) -> Option<Arc<SpectrogramResult>> {
        let slot = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.get(key)?)
        };
        let guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Returns the cached result for `key` or runs `compute` and stores its
    /// success. Concurrent callers for the same key wait for the first one.
    pub fn get_or_compute<F>(&self, key: SpectrogramKey, compute: F) -> AnalysisResult<Arc<SpectrogramResult>>
    where
        F: FnOnce() -> AnalysisResult<SpectrogramResult>,
    {
        let slot = self.slot(&key);
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = guard.as_ref() {
            debug!(axis = %key.axis, window = key.window_size, "Spectrogram cache hit");
            return Ok(Arc::clone(hit));
        }
        let result = Arc::new(compute()?);
        *guard = Some(Arc::clone(&result));
        Ok(result)
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| slot.lock().map(|g| g.is_some()).unwrap_or(false))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Computations still holding a slot finish into a
    /// detached slot and never reach the map again.
    pub fn clear(&self) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let dropped = slots.len();
        slots.clear();
        debug!(dropped, "Spectrogram cache cleared");
    }
}
