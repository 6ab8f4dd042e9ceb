//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use haptic_common::config::HapticConfig;
use haptic_common::position::{LogicalPosition, PhysicalPosition};
use haptic_core::drivers::simulation::{DemoPointSource, DemoProvisioner, SimulatedTransport};
use haptic_core::gateway::{SubmissionGateway, SubmissionLedger};
use haptic_core::groups::BindingsGeneration;
use haptic_core::registry::{DeviceRegistry, RegistryParts};
use haptic_core::remote::RemoteSampleCache;
use haptic_core::scheduler::SamplingWorker;
use haptic_core::synth::SignalSynthesizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Fully wired pipeline without the tick thread.
pub struct Harness {
    pub transport: Arc<SimulatedTransport>,
    pub source: Arc<DemoPointSource>,
    pub provisioner: Arc<DemoProvisioner>,
    pub ledger: Arc<SubmissionLedger>,
    pub remote: Arc<RemoteSampleCache>,
    pub bindings: Arc<BindingsGeneration>,
    pub registry: Arc<DeviceRegistry>,
    pub gateway: Arc<SubmissionGateway>,
}

impl Harness {
    /// Hot-plug off, `positions` provisioned, `connected` devices online.
    pub fn new(connected: &[PhysicalPosition], positions: &[LogicalPosition]) -> Self {
        Self::build(connected, positions, false)
    }

    /// Hot-plug on, empty host, `connected` devices online.
    pub fn hotplug(connected: &[PhysicalPosition]) -> Self {
        Self::build(connected, &[], true)
    }

    fn build(connected: &[PhysicalPosition], positions: &[LogicalPosition], hotplug: bool) -> Self {
        let transport = Arc::new(SimulatedTransport::with_connected(connected.iter().copied()));
        let source = Arc::new(DemoPointSource::with_positions(positions));
        let provisioner = Arc::new(DemoProvisioner::new(Arc::clone(&source)));
        let ledger = Arc::new(SubmissionLedger::default());
        let remote = Arc::new(RemoteSampleCache::new());
        let bindings = Arc::new(BindingsGeneration::new());

        let registry = Arc::new(
            DeviceRegistry::new(
                RegistryParts {
                    transport: transport.clone(),
                    provisioner: provisioner.clone(),
                    points: source.clone(),
                    ledger: Arc::clone(&ledger),
                    remote: Arc::clone(&remote),
                    bindings: Arc::clone(&bindings),
                },
                hotplug,
                Handle::current(),
            )
            .with_readiness(Duration::from_millis(5), 20),
        );
        let gateway = Arc::new(SubmissionGateway::new(
            transport.clone(),
            Arc::clone(&registry),
            Arc::clone(&ledger),
        ));

        Self {
            transport,
            source,
            provisioner,
            ledger,
            remote,
            bindings,
            registry,
            gateway,
        }
    }

    /// Tick worker over this harness, seeded for reproducible jitter.
    pub fn worker(&self, config: &HapticConfig) -> SamplingWorker {
        SamplingWorker::new(
            config,
            self.source.clone(),
            Arc::clone(&self.remote),
            Arc::clone(&self.gateway),
            Arc::clone(&self.bindings),
        )
        .with_synthesizer(SignalSynthesizer::with_seed(7))
    }
}

/// Milliseconds as a `Duration`.
pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Poll `condition` every 5 ms for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(ms(5)).await;
    }
    condition()
}
