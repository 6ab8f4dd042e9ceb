//! Runtime context wiring the pipeline together.
//!
//! `HapticRuntime` constructs every component from the configuration and the
//! host/transport collaborators, so that no state lives in globals. It owns
//! the connectivity event pump (transport feed → registry dispatch) and the
//! sampling scheduler, and performs the best-effort output stop on shutdown.

use crate::gateway::{GatewaySnapshot, SubmissionGateway, SubmissionLedger};
use crate::groups::BindingsGeneration;
use crate::registry::{DeviceRegistry, RegistryParts};
use crate::remote::{RemoteSample, RemoteSampleCache};
use crate::scheduler::{SamplingScheduler, SamplingWorker, SchedulerError, TimingStats};
use haptic_common::config::{ConfigError, HapticConfig};
use haptic_common::host::{PointProvisioner, PointSource};
use haptic_common::position::PhysicalPosition;
use haptic_common::transport::HapticTransport;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runtime construction and startup failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The sampling thread could not start.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// External collaborators the pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Device connection layer.
    pub transport: Arc<dyn HapticTransport>,
    /// Host point snapshots.
    pub points: Arc<dyn PointSource>,
    /// Host point creation.
    pub provisioner: Arc<dyn PointProvisioner>,
}

/// Diagnostic snapshot of the whole pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeDiagnostics {
    /// Transport in use.
    pub transport: &'static str,
    /// Sampling loop timing.
    pub timing: TimingStats,
    /// Gateway counters.
    pub gateway: GatewaySnapshot,
    /// Registered device positions.
    pub registered: Vec<PhysicalPosition>,
    /// Host points currently provided.
    pub points: usize,
    /// Cached remote samples.
    pub remote_samples: usize,
    /// Live submission records.
    pub submission_records: usize,
}

/// Owner of every pipeline component.
pub struct HapticRuntime {
    config: HapticConfig,
    transport: Arc<dyn HapticTransport>,
    points: Arc<dyn PointSource>,
    remote: Arc<RemoteSampleCache>,
    bindings: Arc<BindingsGeneration>,
    registry: Arc<DeviceRegistry>,
    gateway: Arc<SubmissionGateway>,
    scheduler: SamplingScheduler,
    handle: Handle,
    pump: Option<JoinHandle<()>>,
}

impl HapticRuntime {
    /// Build the pipeline; background tasks are spawned on `handle`.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(
        config: HapticConfig,
        collaborators: Collaborators,
        handle: Handle,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let Collaborators {
            transport,
            points,
            provisioner,
        } = collaborators;
        let remote = Arc::new(RemoteSampleCache::new());
        let ledger = Arc::new(SubmissionLedger::new(config.timing.min_submit_interval()));
        let bindings = Arc::new(BindingsGeneration::new());

        let registry = Arc::new(DeviceRegistry::new(
            RegistryParts {
                transport: Arc::clone(&transport),
                provisioner,
                points: Arc::clone(&points),
                ledger: Arc::clone(&ledger),
                remote: Arc::clone(&remote),
                bindings: Arc::clone(&bindings),
            },
            config.features.enable_hotplug,
            handle.clone(),
        ));
        let gateway = Arc::new(
            SubmissionGateway::new(Arc::clone(&transport), Arc::clone(&registry), ledger)
                .with_min_duration(config.timing.min_duration_ms()),
        );
        let worker = SamplingWorker::new(
            &config,
            Arc::clone(&points),
            Arc::clone(&remote),
            Arc::clone(&gateway),
            Arc::clone(&bindings),
        );
        let scheduler = SamplingScheduler::new(&config, worker);

        info!(
            "Haptic runtime created (transport={}, hotplug={}, self_feedback={}, diagnostics={})",
            transport.name(),
            config.features.enable_hotplug,
            config.features.enable_self_feedback,
            config.features.enable_diagnostics
        );

        Ok(Self {
            config,
            transport,
            points,
            remote,
            bindings,
            registry,
            gateway,
            scheduler,
            handle,
            pump: None,
        })
    }

    /// Start the event pump and the sampling loop.
    ///
    /// With hot-plug enabled, devices already connected are registered.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if self.pump.is_none() {
            let mut events = self.transport.subscribe();
            let registry = Arc::clone(&self.registry);
            self.pump = Some(self.handle.spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => registry.dispatch(event),
                        Err(RecvError::Lagged(missed)) => {
                            warn!("Missed {} connectivity events, resyncing", missed);
                            registry.sync_connected();
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                debug!("Connectivity feed closed");
            }));

            if self.registry.hotplug_enabled() {
                self.registry.sync_connected();
            }
        }

        self.scheduler.start()?;
        Ok(())
    }

    /// Stop the sampling loop and the event pump, then silence every device.
    ///
    /// Teardown failures are logged and swallowed.
    pub fn stop(&mut self) {
        let was_running = self.scheduler.is_running() || self.pump.is_some();
        self.scheduler.stop();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if !was_running {
            return;
        }
        if let Err(e) = self.transport.stop_all() {
            debug!("Ignoring stop_all failure during shutdown: {}", e);
        }
        info!("Haptic runtime stopped");
    }

    /// Inject a remote sample for `point_id`.
    pub fn ingest_remote(&self, point_id: usize, sample: RemoteSample) {
        self.remote.update(point_id, sample);
    }

    /// Remote sample cache.
    pub fn remote_samples(&self) -> &Arc<RemoteSampleCache> {
        &self.remote
    }

    /// Device registry.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Submission gateway.
    pub fn gateway(&self) -> &Arc<SubmissionGateway> {
        &self.gateway
    }

    /// Point binding generation counter.
    pub fn bindings(&self) -> &Arc<BindingsGeneration> {
        &self.bindings
    }

    /// Active configuration.
    pub fn config(&self) -> &HapticConfig {
        &self.config
    }

    /// Whether the sampling loop is running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Snapshot of every counter in the pipeline.
    pub fn diagnostics(&self) -> RuntimeDiagnostics {
        RuntimeDiagnostics {
            transport: self.transport.name(),
            timing: self.scheduler.stats(),
            gateway: self.gateway.snapshot(),
            registered: self.registry.registered_positions(),
            points: self.points.point_count(),
            remote_samples: self.remote.len(),
            submission_records: self.gateway.ledger().len(),
        }
    }
}

impl Drop for HapticRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}
