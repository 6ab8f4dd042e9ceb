//! Fixed-interval sampling loop.
//!
//! The [`SamplingScheduler`] owns one dedicated thread that wakes every tick
//! interval and runs [`SamplingWorker::tick`]: read every host point, resolve
//! its sensation (local, remote or silenced), synthesize intensities and
//! submit one frame per device group.
//!
//! The tick thread is the only writer of point runtime state and the only
//! reader of host point snapshots. Registration and remote ingestion run on
//! other tasks; the loop only ever observes their results.

use crate::gateway::{SubmissionGateway, SubmitOutcome};
use crate::groups::{BindingsGeneration, DeviceGroup, build_groups};
use crate::mapper::PositionMapper;
use crate::remote::RemoteSampleCache;
use crate::synth::{Sensation, SignalSynthesizer, quantize};
use haptic_common::config::HapticConfig;
use haptic_common::consts::{DIAGNOSTIC_EVERY_FRAMES, JOIN_TIMEOUT};
use haptic_common::host::{PointOwner, PointSource};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Scheduler failures.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The tick thread could not be spawned.
    #[error("failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ─── Worker ─────────────────────────────────────────────────────────

/// Per-tick synthesis and submission.
pub struct SamplingWorker {
    points: Arc<dyn PointSource>,
    remote: Arc<RemoteSampleCache>,
    gateway: Arc<SubmissionGateway>,
    bindings: Arc<BindingsGeneration>,
    mapper: PositionMapper,
    synth: SignalSynthesizer,
    groups: Vec<DeviceGroup>,
    generation: Option<u64>,
    self_feedback: bool,
    diagnostics: bool,
    frame_duration_ms: u16,
    inputs: Vec<Sensation>,
    frame: Vec<(u8, u8)>,
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Device groups evaluated.
    pub groups: usize,
    /// Frames handed to the gateway.
    pub submitted: usize,
    /// Frames the gateway dispatched.
    pub dispatched: usize,
}

impl SamplingWorker {
    /// Create a worker reading `points` and submitting through `gateway`.
    pub fn new(
        config: &HapticConfig,
        points: Arc<dyn PointSource>,
        remote: Arc<RemoteSampleCache>,
        gateway: Arc<SubmissionGateway>,
        bindings: Arc<BindingsGeneration>,
    ) -> Self {
        Self {
            points,
            remote,
            gateway,
            bindings,
            mapper: PositionMapper,
            synth: SignalSynthesizer::new(),
            groups: Vec::new(),
            generation: None,
            self_feedback: config.features.enable_self_feedback,
            diagnostics: config.features.enable_diagnostics,
            frame_duration_ms: config.timing.frame_duration_ms(),
            inputs: Vec::new(),
            frame: Vec::new(),
        }
    }

    /// Replace the synthesizer, e.g. with a seeded one.
    pub fn with_synthesizer(mut self, synth: SignalSynthesizer) -> Self {
        self.synth = synth;
        self
    }

    /// Current device groups.
    pub fn groups(&self) -> &[DeviceGroup] {
        &self.groups
    }

    /// Run one tick at `now`; `dt` is the time since the previous tick [s].
    pub fn tick(&mut self, now: Instant, dt: f32) -> TickReport {
        let generation = self.bindings.current();
        if self.generation != Some(generation) {
            self.groups = build_groups(self.points.as_ref(), &self.mapper);
            self.generation = Some(generation);
            debug!(
                "Rebuilt {} device groups (bindings generation {})",
                self.groups.len(),
                generation
            );
        }
        self.remote.evict_stale(now);

        self.inputs.clear();
        let mut max_pain = 0.0f32;
        for group in &self.groups {
            for point in &group.points {
                let input = self.resolve(point.point_id, now).sanitized();
                max_pain = max_pain.max(input.pain);
                self.inputs.push(input);
            }
        }
        self.synth.advance_pain(dt, max_pain);

        let mut report = TickReport {
            groups: self.groups.len(),
            ..TickReport::default()
        };
        let mut inputs = self.inputs.iter();
        for group in &mut self.groups {
            self.frame.clear();
            for point in &mut group.points {
                let input = inputs.next().copied().unwrap_or_default();
                let level = quantize(self.synth.synthesize(point, input, dt));
                if level > 0 {
                    self.frame.push((point.motor_index, level));
                }
            }

            let active = !self.frame.is_empty();
            if !active && !group.was_active {
                continue;
            }

            let outcome = self.gateway.submit_at(
                &group.device_key,
                group.logical,
                &self.frame,
                self.frame_duration_ms,
                now,
            );
            report.submitted += 1;
            // A rate-limited or failed silent frame is retried next tick.
            group.was_active = active
                || matches!(
                    outcome,
                    SubmitOutcome::RateLimited | SubmitOutcome::TransportFailed
                );
            if outcome.is_dispatched() {
                report.dispatched += 1;
            }
            if self.diagnostics {
                trace!(
                    "Frame {} ({} active motors): {:?}",
                    group.device_key,
                    self.frame.len(),
                    outcome
                );
            }
        }
        report
    }

    fn resolve(&self, point_id: usize, now: Instant) -> Sensation {
        let Some(sample) = self.points.point_at(point_id) else {
            return Sensation::default();
        };
        match sample.owner {
            PointOwner::Local if self.self_feedback => Sensation {
                force: sample.force,
                pain: sample.pain,
                temperature: sample.temperature,
                vibration: sample.vibration,
            },
            PointOwner::Local => Sensation::default(),
            PointOwner::Remote => self
                .remote
                .fresh(point_id, now)
                .map(|remote| remote.sensation())
                .unwrap_or_default(),
        }
    }
}

// ─── Timing statistics ──────────────────────────────────────────────

/// Timing statistics for tick loop monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingStats {
    /// Number of ticks executed.
    pub cycle_count: u64,
    /// Number of ticks that exceeded the interval.
    pub timing_violations: u64,
    /// Maximum observed tick time.
    pub max_cycle_time_us: u64,
    /// Sum of tick times for average calculation.
    pub total_cycle_time_us: u64,
    /// Frames dispatched over the session.
    pub frames_dispatched: u64,
}

impl TimingStats {
    /// Average tick time, 0 before the first tick.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

struct TickThread {
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

/// Owner of the tick thread.
pub struct SamplingScheduler {
    worker: Arc<Mutex<SamplingWorker>>,
    points: Arc<dyn PointSource>,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<TimingStats>>,
    tick_interval: Duration,
    diagnostics: bool,
    thread: Option<TickThread>,
}

impl SamplingScheduler {
    /// Create a stopped scheduler.
    pub fn new(config: &HapticConfig, worker: SamplingWorker) -> Self {
        let points = Arc::clone(&worker.points);
        Self {
            worker: Arc::new(Mutex::new(worker)),
            points,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(TimingStats::default())),
            tick_interval: config.timing.tick_interval(),
            diagnostics: config.features.enable_diagnostics,
            thread: None,
        }
    }

    /// Spawn the tick thread.
    ///
    /// Starting a running scheduler is a no-op. Starting without any host
    /// point is allowed; the loop idles until points appear.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.thread.is_some() {
            warn!("Sampling scheduler already running");
            return Ok(());
        }
        if self.points.point_count() == 0 {
            warn!("Starting sampling scheduler with no haptic points; idling until points appear");
        }

        let (done_tx, done) = mpsc::channel();
        let worker = Arc::clone(&self.worker);
        // Each loop gets its own flag: a detached loop must never be re-armed.
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);
        let stats = Arc::clone(&self.stats);
        let tick_interval = self.tick_interval;
        let diagnostics = self.diagnostics;

        let spawned = thread::Builder::new()
            .name("haptic-sampler".to_string())
            .spawn(move || {
                run_loop(&worker, &running, &stats, tick_interval, diagnostics);
                let _ = done_tx.send(());
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        info!(
            "Sampling scheduler started (interval={}ms)",
            tick_interval.as_millis()
        );
        self.thread = Some(TickThread { handle, done });
        Ok(())
    }

    /// Request cooperative shutdown and wait up to the join timeout.
    ///
    /// A loop that does not finish in time is detached. Stopping a stopped
    /// scheduler is a no-op.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);

        match thread.done.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if thread.handle.join().is_err() {
                    warn!("Sampling thread panicked");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "Sampling thread did not stop within {}ms, detaching",
                    JOIN_TIMEOUT.as_millis()
                );
            }
        }
        let stats = *self.stats.lock();
        info!(
            "Sampling scheduler stopped after {} ticks (violations: {})",
            stats.cycle_count, stats.timing_violations
        );
    }

    /// Whether the tick thread is running.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Copy of the timing statistics.
    pub fn stats(&self) -> TimingStats {
        *self.stats.lock()
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    worker: &Mutex<SamplingWorker>,
    running: &AtomicBool,
    stats: &Mutex<TimingStats>,
    tick_interval: Duration,
    diagnostics: bool,
) {
    request_rt_priority();
    if detect_rt_mode() {
        info!("Sampling loop running in real-time mode");
    } else {
        info!("Sampling loop running in standard (non-RT) mode");
    }

    let target_us = tick_interval.as_micros() as u64;
    let mut last_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let dt = cycle_start.duration_since(last_tick);
        last_tick = cycle_start;

        let report = worker.lock().tick(cycle_start, dt.as_secs_f32());

        let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
        let snapshot = {
            let mut stats = stats.lock();
            stats.cycle_count += 1;
            stats.total_cycle_time_us += cycle_time_us;
            stats.max_cycle_time_us = stats.max_cycle_time_us.max(cycle_time_us);
            stats.frames_dispatched += report.dispatched as u64;
            if cycle_time_us > target_us {
                stats.timing_violations += 1;
            }
            *stats
        };

        if cycle_time_us > target_us
            && (snapshot.timing_violations <= 10 || snapshot.timing_violations % 1000 == 0)
        {
            warn!(
                "Timing violation #{}: tick took {}us (target {}us)",
                snapshot.timing_violations, cycle_time_us, target_us
            );
        }

        if diagnostics && snapshot.cycle_count % DIAGNOSTIC_EVERY_FRAMES == 0 {
            debug!(
                "Sampling loop: {} ticks, avg={}us, max={}us, violations={}, groups={}, dispatched={}",
                snapshot.cycle_count,
                snapshot.avg_cycle_time_us(),
                snapshot.max_cycle_time_us,
                snapshot.timing_violations,
                report.groups,
                snapshot.frames_dispatched
            );
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < tick_interval {
            thread::sleep(tick_interval - elapsed);
        }
    }
}

/// Best-effort switch of the calling thread to `SCHED_FIFO`.
fn request_rt_priority() {
    #[cfg(target_os = "linux")]
    {
        let param = libc::sched_param { sched_priority: 10 };
        // SAFETY: `param` is a valid sched_param for the duration of the call.
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            debug!(
                "SCHED_FIFO unavailable ({}), using normal priority",
                std::io::Error::last_os_error()
            );
        }
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: querying the calling thread's policy has no preconditions.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

impl std::fmt::Debug for SamplingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingScheduler")
            .field("running", &self.is_running())
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_cycle_time() {
        let mut stats = TimingStats::default();
        assert_eq!(stats.avg_cycle_time_us(), 0);
        stats.cycle_count = 4;
        stats.total_cycle_time_us = 100;
        assert_eq!(stats.avg_cycle_time_us(), 25);
    }

    #[tokio::test]
    async fn restart_does_not_rearm_previous_loop() {
        use crate::drivers::simulation::{DemoPointSource, DemoProvisioner, SimulatedTransport};
        use crate::gateway::SubmissionLedger;
        use crate::registry::{DeviceRegistry, RegistryParts};
        use tokio::runtime::Handle;

        let transport = Arc::new(SimulatedTransport::new());
        let source = Arc::new(DemoPointSource::new());
        let ledger = Arc::new(SubmissionLedger::default());
        let remote = Arc::new(RemoteSampleCache::new());
        let bindings = Arc::new(BindingsGeneration::new());
        let registry = Arc::new(DeviceRegistry::new(
            RegistryParts {
                transport: transport.clone(),
                provisioner: Arc::new(DemoProvisioner::new(Arc::clone(&source))),
                points: source.clone(),
                ledger: Arc::clone(&ledger),
                remote: Arc::clone(&remote),
                bindings: Arc::clone(&bindings),
            },
            false,
            Handle::current(),
        ));
        let gateway = Arc::new(SubmissionGateway::new(transport, registry, ledger));
        let config = HapticConfig::default();
        let worker = SamplingWorker::new(&config, source, remote, gateway, bindings);
        let mut scheduler = SamplingScheduler::new(&config, worker);

        scheduler.start().expect("first start");
        let first = Arc::clone(&scheduler.running);
        scheduler.stop();
        assert!(!first.load(Ordering::SeqCst));

        scheduler.start().expect("second start");
        assert!(scheduler.running.load(Ordering::SeqCst));
        // A loop left over from the first start would still see its own flag cleared.
        assert!(!Arc::ptr_eq(&first, &scheduler.running));
        assert!(!first.load(Ordering::SeqCst));
        scheduler.stop();
    }

    #[test]
    fn spawn_error_display() {
        let err = SchedulerError::from(std::io::Error::other("no threads"));
        assert!(err.to_string().contains("no threads"));
    }
}
