//! Cache of externally supplied point sensations.
//!
//! A remote feed writes samples keyed by point id; the sampling worker reads
//! them for points the host marked as remote-owned. Entries older than the
//! staleness window are never used: a stale entry reads exactly like an
//! absent one.

use crate::synth::Sensation;
use haptic_common::consts::{REMOTE_STALE_AFTER, REMOTE_SWEEP_INTERVAL};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// One externally supplied point value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteSample {
    /// Pressure, 0..=1.
    pub force: f32,
    /// Signed temperature deviation, -100..=100.
    pub temperature: f32,
    /// Pain, 0..=1.
    pub pain: f32,
    /// Vibration strength, 0..=1.
    pub vibration: f32,
    /// When the sample was received.
    pub timestamp: Instant,
}

impl RemoteSample {
    /// Sample received now.
    pub fn new(force: f32, temperature: f32, pain: f32, vibration: f32) -> Self {
        Self::at(force, temperature, pain, vibration, Instant::now())
    }

    /// Sample received at `timestamp`.
    pub fn at(force: f32, temperature: f32, pain: f32, vibration: f32, timestamp: Instant) -> Self {
        Self {
            force,
            temperature,
            pain,
            vibration,
            timestamp,
        }
    }

    /// Whether at least one channel carries a sensation.
    pub fn is_active(&self) -> bool {
        self.force != 0.0 || self.temperature != 0.0 || self.pain != 0.0 || self.vibration != 0.0
    }

    /// Raw inputs for the synthesizer.
    pub fn sensation(&self) -> Sensation {
        Sensation {
            force: self.force,
            pain: self.pain,
            temperature: self.temperature,
            vibration: self.vibration,
        }
    }

    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.timestamp) > window
    }
}

/// Concurrent point id → [`RemoteSample`] store with staleness eviction.
#[derive(Debug)]
pub struct RemoteSampleCache {
    samples: RwLock<HashMap<usize, RemoteSample>>,
    last_sweep: Mutex<Option<Instant>>,
    stale_after: Duration,
    sweep_interval: Duration,
}

impl RemoteSampleCache {
    /// Cache with the default 500 ms staleness window.
    pub fn new() -> Self {
        Self::with_windows(REMOTE_STALE_AFTER, REMOTE_SWEEP_INTERVAL)
    }

    /// Cache with explicit staleness and sweep intervals.
    pub fn with_windows(stale_after: Duration, sweep_interval: Duration) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(None),
            stale_after,
            sweep_interval,
        }
    }

    /// Store or replace the sample of `point_id`.
    pub fn update(&self, point_id: usize, sample: RemoteSample) {
        self.samples.write().insert(point_id, sample);
    }

    /// Forget the sample of `point_id`.
    pub fn clear(&self, point_id: usize) -> bool {
        self.samples.write().remove(&point_id).is_some()
    }

    /// Forget the samples of several points; returns how many were removed.
    pub fn clear_points(&self, point_ids: impl IntoIterator<Item = usize>) -> usize {
        let mut samples = self.samples.write();
        point_ids
            .into_iter()
            .filter(|id| samples.remove(id).is_some())
            .count()
    }

    /// Forget everything.
    pub fn clear_all(&self) {
        self.samples.write().clear();
    }

    /// The sample of `point_id`, unless absent or stale at `now`.
    pub fn fresh(&self, point_id: usize, now: Instant) -> Option<RemoteSample> {
        self.samples
            .read()
            .get(&point_id)
            .filter(|sample| !sample.is_stale(now, self.stale_after))
            .copied()
    }

    /// Whether `point_id` has a fresh sample with a non-zero channel.
    pub fn has_fresh(&self, point_id: usize) -> bool {
        self.has_fresh_at(point_id, Instant::now())
    }

    /// [`RemoteSampleCache::has_fresh`] evaluated at `now`.
    pub fn has_fresh_at(&self, point_id: usize, now: Instant) -> bool {
        self.fresh(point_id, now).is_some_and(|s| s.is_active())
    }

    /// Remove stale entries, at most once per sweep interval.
    ///
    /// Returns the number of evicted entries (0 when throttled).
    pub fn evict_stale(&self, now: Instant) -> usize {
        {
            let mut last = self.last_sweep.lock();
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) < self.sweep_interval {
                    return 0;
                }
            }
            *last = Some(now);
        }

        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|_, sample| !sample.is_stale(now, self.stale_after));
        let evicted = before - samples.len();
        if evicted > 0 {
            debug!("Evicted {} stale remote samples", evicted);
        }
        evicted
    }

    /// Number of cached entries, stale ones included.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

impl Default for RemoteSampleCache {
    fn default() -> Self {
        Self::new()
    }
}
