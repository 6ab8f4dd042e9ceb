//! Device registry and hot-plug state machine.
//!
//! The registry owns everything that changes when a device connects or
//! disconnects: the short-lived connectivity cache, the per-position
//! registration state, and the cleanup of submission records, remote samples
//! and device output on disconnect.
//!
//! # State machine
//!
//! ```text
//! Unregistered ──connect──► Registering ──ok──► Registered
//!      ▲                        │                   │
//!      └────────failure─────────┘              disconnect
//!      ▲                                            ▼
//!      └──────────────────────────────────── Unregistering
//! ```
//!
//! All transitions go through [`DeviceRegistry::dispatch`]; concurrent
//! registrations of one position share a single in-flight attempt.

use crate::gateway::SubmissionLedger;
use crate::groups::{BindingsGeneration, device_key, split_key};
use crate::initializers::InitializerTable;
use crate::mapper::PositionMapper;
use crate::remote::RemoteSampleCache;
use haptic_common::consts::{CONNECTION_CACHE_TTL, READINESS_POLL_INTERVAL, READINESS_RETRIES};
use haptic_common::host::{PointProvisioner, PointSource, ProvisionError};
use haptic_common::position::{LogicalPosition, PhysicalPosition};
use haptic_common::transport::{ConnectivityEvent, HapticTransport};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a registration attempt did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Host point provisioning never became ready within the retry budget.
    #[error("point provisioning not ready after retry budget")]
    NotReady,

    /// No initializer is registered for the position.
    #[error("no initializer for {0}")]
    NoInitializer(PhysicalPosition),

    /// The host initializer failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The attempt was cancelled by a disconnect.
    #[error("registration cancelled")]
    Cancelled,
}

/// Registration state of one device position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// No host points exist for the device.
    #[default]
    Unregistered,
    /// A registration attempt is in flight.
    Registering,
    /// Host points exist and the device receives frames.
    Registered,
    /// Disconnect cleanup is running.
    Unregistering,
}

type Outcome = Option<Result<(), RegistrationError>>;

struct Flight {
    id: u64,
    outcome: watch::Receiver<Outcome>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Entry {
    state: RegistrationState,
    flight: Option<Flight>,
}

#[derive(Debug, Clone, Copy)]
struct CachedConnection {
    active: bool,
    checked_at: Instant,
}

/// Collaborators and shared state the registry operates on.
pub struct RegistryParts {
    /// Device connection layer.
    pub transport: Arc<dyn HapticTransport>,
    /// Host point creation.
    pub provisioner: Arc<dyn PointProvisioner>,
    /// Host point snapshots, used to find the points of a position.
    pub points: Arc<dyn PointSource>,
    /// Submission records, purged on disconnect.
    pub ledger: Arc<SubmissionLedger>,
    /// Remote samples, purged on disconnect.
    pub remote: Arc<RemoteSampleCache>,
    /// Bumped after a successful registration.
    pub bindings: Arc<BindingsGeneration>,
}

/// Per-position registration state and connectivity cache.
pub struct DeviceRegistry {
    transport: Arc<dyn HapticTransport>,
    provisioner: Arc<dyn PointProvisioner>,
    points: Arc<dyn PointSource>,
    ledger: Arc<SubmissionLedger>,
    remote: Arc<RemoteSampleCache>,
    bindings: Arc<BindingsGeneration>,
    initializers: InitializerTable,
    mapper: PositionMapper,
    hotplug: bool,
    handle: Handle,
    poll_interval: Duration,
    retries: u32,
    cache_ttl: Duration,
    entries: Mutex<HashMap<PhysicalPosition, Entry>>,
    connections: Mutex<HashMap<PhysicalPosition, CachedConnection>>,
    next_flight: AtomicU64,
}

impl DeviceRegistry {
    /// Create a registry; registration tasks are spawned on `handle`.
    pub fn new(parts: RegistryParts, hotplug: bool, handle: Handle) -> Self {
        Self {
            transport: parts.transport,
            provisioner: parts.provisioner,
            points: parts.points,
            ledger: parts.ledger,
            remote: parts.remote,
            bindings: parts.bindings,
            initializers: InitializerTable::with_defaults(),
            mapper: PositionMapper,
            hotplug,
            handle,
            poll_interval: READINESS_POLL_INTERVAL,
            retries: READINESS_RETRIES,
            cache_ttl: CONNECTION_CACHE_TTL,
            entries: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(1),
        }
    }

    /// Replace the initializer table.
    pub fn with_initializers(mut self, initializers: InitializerTable) -> Self {
        self.initializers = initializers;
        self
    }

    /// Override the readiness wait (poll interval and number of polls).
    pub fn with_readiness(mut self, poll_interval: Duration, retries: u32) -> Self {
        self.poll_interval = poll_interval;
        self.retries = retries;
        self
    }

    /// Whether connect events trigger registration.
    pub fn hotplug_enabled(&self) -> bool {
        self.hotplug
    }

    // ─── Connectivity ───────────────────────────────────────────────

    /// Whether the device at `position` is connected, as of the cache.
    ///
    /// The transport is queried at most once per cache TTL per position.
    pub fn is_connected(&self, position: PhysicalPosition, now: Instant) -> bool {
        if let Some(cached) = self.connections.lock().get(&position) {
            if now.saturating_duration_since(cached.checked_at) < self.cache_ttl {
                return cached.active;
            }
        }
        let active = self.transport.is_connected(position);
        self.connections.lock().insert(
            position,
            CachedConnection {
                active,
                checked_at: now,
            },
        );
        active
    }

    /// Whether frames for `position` may reach the transport.
    ///
    /// With hot-plug enabled the device must also be registered.
    pub fn is_deliverable(&self, position: PhysicalPosition, now: Instant) -> bool {
        self.is_connected(position, now)
            && (!self.hotplug || self.state(position) == RegistrationState::Registered)
    }

    fn remember(&self, position: PhysicalPosition, active: bool) {
        self.connections.lock().insert(
            position,
            CachedConnection {
                active,
                checked_at: Instant::now(),
            },
        );
    }

    // ─── State machine ──────────────────────────────────────────────

    /// Apply a connectivity change.
    ///
    /// Connect events start a background registration when hot-plug is
    /// enabled; disconnect events run the cleanup synchronously.
    pub fn dispatch(self: &Arc<Self>, event: ConnectivityEvent) {
        debug!(
            "Connectivity event: {} {}",
            event.position,
            if event.connected { "connected" } else { "disconnected" }
        );
        self.remember(event.position, event.connected);

        if !event.connected {
            self.unregister(event.position);
            return;
        }
        if !self.hotplug {
            return;
        }

        let this = Arc::clone(self);
        self.handle.spawn(async move {
            if let Err(e) = this.register(event.position).await {
                warn!("Registration of {} failed: {}", event.position, e);
            }
        });
    }

    /// Reconcile with the transport's current connectivity.
    ///
    /// Connected devices get a connect event; registered devices that are
    /// gone get a disconnect event. Used at startup and after missed events.
    pub fn sync_connected(self: &Arc<Self>) {
        for position in PhysicalPosition::ALL {
            let connected = self.transport.is_connected(position);
            if connected || self.state(position) == RegistrationState::Registered {
                self.dispatch(ConnectivityEvent {
                    position,
                    connected,
                });
            }
        }
    }

    /// Register `position`, joining an attempt already in flight.
    ///
    /// Returns immediately when the position is already registered. Every
    /// caller joining one attempt observes the same outcome.
    pub async fn register(self: &Arc<Self>, position: PhysicalPosition) -> Result<(), RegistrationError> {
        let mut outcome = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(position).or_default();
            if entry.state == RegistrationState::Registered {
                return Ok(());
            }
            match &entry.flight {
                Some(flight) => flight.outcome.clone(),
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    let this = Arc::clone(self);
                    let task = self.handle.spawn(async move {
                        let result = this.attempt(position).await;
                        this.finish(position, id, &result);
                        let _ = tx.send(Some(result));
                    });
                    entry.state = RegistrationState::Registering;
                    entry.flight = Some(Flight {
                        id,
                        outcome: rx.clone(),
                        task,
                    });
                    info!("Registering {}", position);
                    rx
                }
            }
        };

        match outcome.wait_for(Option::is_some).await {
            Ok(result) => (*result).clone().unwrap_or(Err(RegistrationError::Cancelled)),
            Err(_) => Err(RegistrationError::Cancelled),
        }
    }

    async fn attempt(&self, position: PhysicalPosition) -> Result<(), RegistrationError> {
        let mut polls = 0;
        while !self.provisioner.is_ready() {
            if polls >= self.retries {
                return Err(RegistrationError::NotReady);
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
        }

        let initializer = self
            .initializers
            .get(position)
            .ok_or(RegistrationError::NoInitializer(position))?;
        let provisioner = Arc::clone(&self.provisioner);
        tokio::task::spawn_blocking(move || initializer(provisioner.as_ref()))
            .await
            .map_err(|_| RegistrationError::Cancelled)??;
        Ok(())
    }

    fn finish(&self, position: PhysicalPosition, id: u64, result: &Result<(), RegistrationError>) {
        {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&position) else {
                return;
            };
            if entry.flight.as_ref().map(|f| f.id) != Some(id) {
                return;
            }
            entry.flight = None;
            entry.state = if result.is_ok() {
                RegistrationState::Registered
            } else {
                RegistrationState::Unregistered
            };
        }

        match result {
            Ok(()) => {
                let generation = self.bindings.bump();
                info!("Registered {} (bindings generation {})", position, generation);
            }
            Err(e) => warn!("Could not register {}: {}", position, e),
        }
    }

    /// Disconnect cleanup for `position`.
    ///
    /// Cancels an in-flight registration, purges submission records and
    /// remote samples of the position's points and stops its output.
    pub fn unregister(&self, position: PhysicalPosition) {
        let (previous, flight) = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(position).or_default();
            let previous = entry.state;
            entry.state = RegistrationState::Unregistering;
            (previous, entry.flight.take())
        };
        if let Some(flight) = flight {
            flight.task.abort();
            debug!("Cancelled in-flight registration of {}", position);
        }

        let records = self.ledger.purge_position(position);
        let point_ids: Vec<usize> = (0..self.points.point_count())
            .filter_map(|id| self.points.point_at(id).map(|sample| (id, sample)))
            .filter(|(_, sample)| self.mapper.feeds(sample.position, position))
            .map(|(id, _)| id)
            .collect();
        let samples = self.remote.clear_points(point_ids);

        for key in self.output_keys(position) {
            if let Err(e) = self.transport.stop(&key) {
                debug!("Ignoring stop failure for '{}': {}", key, e);
            }
        }
        self.remember(position, false);

        if let Some(entry) = self.entries.lock().get_mut(&position) {
            if entry.state == RegistrationState::Unregistering {
                entry.state = RegistrationState::Unregistered;
            }
        }
        info!(
            "Unregistered {} (was {:?}): purged {} records, {} remote samples",
            position, previous, records, samples
        );
    }

    fn output_keys(&self, position: PhysicalPosition) -> Vec<String> {
        let mut keys: Vec<String> = LogicalPosition::ALL
            .iter()
            .filter(|&&logical| self.mapper.feeds(logical, position))
            .map(|&logical| {
                let key = device_key(logical);
                if self.mapper.to_physical(logical) == position {
                    key
                } else {
                    split_key(&key, position)
                }
            })
            .collect();
        keys.sort();
        keys
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Registration state of `position`.
    pub fn state(&self, position: PhysicalPosition) -> RegistrationState {
        self.entries
            .lock()
            .get(&position)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    /// Positions currently registered, in stable order.
    pub fn registered_positions(&self) -> Vec<PhysicalPosition> {
        let mut positions: Vec<_> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.state == RegistrationState::Registered)
            .map(|(&position, _)| position)
            .collect();
        positions.sort();
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haptic_common::position::Side;

    #[test]
    fn registration_error_display() {
        let err = RegistrationError::NoInitializer(PhysicalPosition::Foot(Side::Left));
        assert!(err.to_string().contains("foot_l"));

        let err = RegistrationError::from(ProvisionError::Failed("boom".to_string()));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn default_state_is_unregistered() {
        assert_eq!(RegistrationState::default(), RegistrationState::Unregistered);
    }
}
