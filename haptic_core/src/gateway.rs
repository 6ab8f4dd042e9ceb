//! Rate-limited, connectivity-guarded frame submission.
//!
//! Every frame the sampling worker produces goes through
//! [`SubmissionGateway::submit`]. The gateway never fails towards its
//! caller: each call returns a [`SubmitOutcome`] describing what happened
//! to the frame.
//!
//! # Pipeline
//!
//! 1. Torso split: a whole-torso frame is divided between the vest halves
//!    when only the halves are connected.
//! 2. Rate limiting per (device, key) through the [`SubmissionLedger`].
//! 3. Connectivity guard through the device registry.
//! 4. Packing to a dense motor array with a minimum play duration.
//! 5. Dispatch to the transport; failures are logged and dropped.

use crate::groups::split_key;
use crate::mapper::PositionMapper;
use crate::registry::DeviceRegistry;
use haptic_common::consts::{
    MIN_DURATION_MS, MIN_SUBMIT_INTERVAL_MS, SUBMISSION_STALE_AFTER, SUBMISSION_SWEEP_EVERY,
    VEST_HALF_MOTORS,
};
use haptic_common::position::{LogicalPosition, PhysicalPosition};
use haptic_common::transport::{HapticTransport, PlayCommand};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// What happened to one submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the transport.
    Dispatched,
    /// Dropped: the same key was submitted to the device too recently.
    RateLimited,
    /// Dropped: the device is not connected (or not registered).
    NotConnected,
    /// Dropped: the transport reported an error.
    TransportFailed,
    /// Divided between the vest halves; `dispatched` halves reached the transport.
    Split {
        /// Number of half frames dispatched.
        dispatched: usize,
    },
}

impl SubmitOutcome {
    /// Whether at least one frame reached the transport.
    pub fn is_dispatched(&self) -> bool {
        match self {
            SubmitOutcome::Dispatched => true,
            SubmitOutcome::Split { dispatched } => *dispatched > 0,
            _ => false,
        }
    }
}

// ─── Submission ledger ──────────────────────────────────────────────

/// Last submission time per device and key.
#[derive(Debug)]
pub struct SubmissionLedger {
    records: Mutex<HashMap<PhysicalPosition, HashMap<String, Instant>>>,
    min_interval: Duration,
    stale_after: Duration,
}

impl SubmissionLedger {
    /// Ledger enforcing `min_interval` between submissions of one key.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            min_interval,
            stale_after: SUBMISSION_STALE_AFTER,
        }
    }

    /// Record a submission of `key` to `position` at `now`.
    ///
    /// Returns `false` without recording anything when the previous
    /// submission of the same key happened less than the minimum interval
    /// ago. Check and record happen under one lock.
    pub fn try_acquire(&self, position: PhysicalPosition, key: &str, now: Instant) -> bool {
        let mut records = self.records.lock();
        let keys = records.entry(position).or_default();
        if let Some(&last) = keys.get(key) {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        keys.insert(key.to_string(), now);
        true
    }

    /// Drop records older than the staleness window; returns how many.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let mut records = self.records.lock();
        let mut purged = 0;
        records.retain(|_, keys| {
            let before = keys.len();
            keys.retain(|_, last| now.saturating_duration_since(*last) <= self.stale_after);
            purged += before - keys.len();
            !keys.is_empty()
        });
        purged
    }

    /// Drop every record of `position`; returns how many.
    pub fn purge_position(&self, position: PhysicalPosition) -> usize {
        self.records
            .lock()
            .remove(&position)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    /// Number of records of `position`.
    pub fn records_for(&self, position: PhysicalPosition) -> usize {
        self.records.lock().get(&position).map_or(0, HashMap::len)
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.lock().values().map(HashMap::len).sum()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubmissionLedger {
    fn default() -> Self {
        Self::new(Duration::from_millis(MIN_SUBMIT_INTERVAL_MS))
    }
}

// ─── Counters ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct GatewayCounters {
    submitted: AtomicU64,
    dispatched: AtomicU64,
    rate_limited: AtomicU64,
    not_connected: AtomicU64,
    transport_failures: AtomicU64,
}

/// Point-in-time copy of the gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewaySnapshot {
    /// Frames submitted (split halves counted separately).
    pub submitted: u64,
    /// Frames handed to the transport.
    pub dispatched: u64,
    /// Frames dropped by the rate limiter.
    pub rate_limited: u64,
    /// Frames dropped because the device was unavailable.
    pub not_connected: u64,
    /// Frames the transport failed to play.
    pub transport_failures: u64,
}

// ─── Gateway ────────────────────────────────────────────────────────

/// Single entry point for frame submission.
pub struct SubmissionGateway {
    transport: Arc<dyn HapticTransport>,
    registry: Arc<DeviceRegistry>,
    ledger: Arc<SubmissionLedger>,
    mapper: PositionMapper,
    min_duration_ms: u16,
    counters: GatewayCounters,
}

impl SubmissionGateway {
    /// Create a gateway with the default 40 ms duration floor.
    pub fn new(
        transport: Arc<dyn HapticTransport>,
        registry: Arc<DeviceRegistry>,
        ledger: Arc<SubmissionLedger>,
    ) -> Self {
        Self {
            transport,
            registry,
            ledger,
            mapper: PositionMapper,
            min_duration_ms: MIN_DURATION_MS,
            counters: GatewayCounters::default(),
        }
    }

    /// Override the minimum play duration.
    pub fn with_min_duration(mut self, min_duration_ms: u16) -> Self {
        self.min_duration_ms = min_duration_ms;
        self
    }

    /// Submit a sparse frame for `position` under `key`.
    pub fn submit(
        &self,
        key: &str,
        position: LogicalPosition,
        points: &[(u8, u8)],
        duration_ms: u16,
    ) -> SubmitOutcome {
        self.submit_at(key, position, points, duration_ms, Instant::now())
    }

    /// [`SubmissionGateway::submit`] evaluated at `now`.
    pub fn submit_at(
        &self,
        key: &str,
        position: LogicalPosition,
        points: &[(u8, u8)],
        duration_ms: u16,
        now: Instant,
    ) -> SubmitOutcome {
        if position == LogicalPosition::Torso && self.torso_is_split(now) {
            return self.submit_split(key, points, duration_ms, now);
        }

        let physical = self.mapper.to_physical(position);
        let submitted = self.counters.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        if submitted % SUBMISSION_SWEEP_EVERY == 0 {
            let purged = self.ledger.purge_stale(now);
            debug!("Submission sweep #{}: purged {} stale records", submitted, purged);
        }

        if !self.ledger.try_acquire(physical, key, now) {
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            trace!("Rate limited '{}' on {}", key, physical);
            return SubmitOutcome::RateLimited;
        }

        if !self.registry.is_deliverable(physical, now) {
            self.counters.not_connected.fetch_add(1, Ordering::Relaxed);
            trace!("Skipping '{}': {} not available", key, physical);
            return SubmitOutcome::NotConnected;
        }

        let command = PlayCommand {
            key: key.to_string(),
            duration_ms: duration_ms.max(self.min_duration_ms),
            position: physical,
            motors: self.mapper.pack(physical, points),
        };

        match self.transport.play(&command) {
            Ok(()) => {
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                SubmitOutcome::Dispatched
            }
            Err(e) => {
                let failures = self.counters.transport_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures <= 10 || failures % 1000 == 0 {
                    warn!(
                        "Transport failure #{} playing '{}' on {}: {}",
                        failures, key, physical, e
                    );
                }
                SubmitOutcome::TransportFailed
            }
        }
    }

    /// Copy of the counters.
    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            not_connected: self.counters.not_connected.load(Ordering::Relaxed),
            transport_failures: self.counters.transport_failures.load(Ordering::Relaxed),
        }
    }

    /// Shared submission ledger.
    pub fn ledger(&self) -> &Arc<SubmissionLedger> {
        &self.ledger
    }

    fn torso_is_split(&self, now: Instant) -> bool {
        !self.registry.is_connected(PhysicalPosition::Vest, now)
            && (self.registry.is_connected(PhysicalPosition::VestFront, now)
                || self.registry.is_connected(PhysicalPosition::VestBack, now))
    }

    fn submit_split(
        &self,
        key: &str,
        points: &[(u8, u8)],
        duration_ms: u16,
        now: Instant,
    ) -> SubmitOutcome {
        let (front, back): (Vec<(u8, u8)>, Vec<(u8, u8)>) =
            points.iter().partition(|&&(index, _)| index < VEST_HALF_MOTORS);
        let back: Vec<(u8, u8)> = back
            .into_iter()
            .map(|(index, value)| (index - VEST_HALF_MOTORS, value))
            .collect();

        let halves = [
            (PhysicalPosition::VestFront, LogicalPosition::TorsoFront, front),
            (PhysicalPosition::VestBack, LogicalPosition::TorsoBack, back),
        ];
        let dispatched = halves
            .iter()
            .map(|(half, logical, points)| {
                self.submit_at(&split_key(key, *half), *logical, points, duration_ms, now)
            })
            .filter(SubmitOutcome::is_dispatched)
            .count();
        SubmitOutcome::Split { dispatched }
    }
}
