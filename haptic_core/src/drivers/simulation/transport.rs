//! In-memory haptic transport.
//!
//! The `SimulatedTransport` implements `HapticTransport` by recording every
//! call in a bounded log, together with the encoded wire frame a byte
//! transport would have sent. Connectivity is toggled by hand and broadcast
//! to subscribers like a real connection layer would.

use haptic_common::codec::Frame;
use haptic_common::position::PhysicalPosition;
use haptic_common::transport::{ConnectivityEvent, HapticTransport, PlayCommand, TransportError};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Default number of calls kept in the log.
const DEFAULT_LOG_CAPACITY: usize = 4096;
/// Connectivity broadcast buffer.
const EVENT_CAPACITY: usize = 64;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `play()` accepted.
    Play(PlayCommand),
    /// `stop()` for a key.
    Stop(String),
    /// `stop_all()`.
    StopAll,
}

struct Recorded {
    call: TransportCall,
    wire: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    connected: HashSet<PhysicalPosition>,
    log: VecDeque<Recorded>,
    failing: bool,
}

/// Transport simulation recording calls in memory.
pub struct SimulatedTransport {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ConnectivityEvent>,
    capacity: usize,
    queries: AtomicU64,
}

impl SimulatedTransport {
    /// Transport with no device connected.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            capacity: DEFAULT_LOG_CAPACITY,
            queries: AtomicU64::new(0),
        }
    }

    /// Transport with `positions` connected from the start.
    pub fn with_connected(positions: impl IntoIterator<Item = PhysicalPosition>) -> Self {
        let transport = Self::new();
        transport.inner.lock().connected.extend(positions);
        transport
    }

    /// Transport with every device position connected.
    pub fn with_all_connected() -> Self {
        Self::with_connected(PhysicalPosition::ALL)
    }

    /// Mark `position` connected and notify subscribers.
    pub fn connect(&self, position: PhysicalPosition) {
        if self.inner.lock().connected.insert(position) {
            info!("Simulated device connected: {}", position);
            let _ = self.events.send(ConnectivityEvent {
                position,
                connected: true,
            });
        }
    }

    /// Mark `position` disconnected and notify subscribers.
    pub fn disconnect(&self, position: PhysicalPosition) {
        if self.inner.lock().connected.remove(&position) {
            info!("Simulated device disconnected: {}", position);
            let _ = self.events.send(ConnectivityEvent {
                position,
                connected: false,
            });
        }
    }

    /// Make `play` fail with a communication error.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Every recorded call, oldest first.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().log.iter().map(|r| r.call.clone()).collect()
    }

    /// Accepted play commands, oldest first.
    pub fn plays(&self) -> Vec<PlayCommand> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|r| match &r.call {
                TransportCall::Play(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Accepted play commands addressed to `position`.
    pub fn plays_for(&self, position: PhysicalPosition) -> Vec<PlayCommand> {
        self.plays()
            .into_iter()
            .filter(|command| command.position == position)
            .collect()
    }

    /// Keys passed to `stop`, oldest first.
    pub fn stops(&self) -> Vec<String> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|r| match &r.call {
                TransportCall::Stop(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// The recorded calls as decoded wire frames.
    pub fn wire_frames(&self) -> Vec<Frame> {
        self.inner
            .lock()
            .log
            .iter()
            .filter_map(|r| Frame::decode(&r.wire).ok())
            .collect()
    }

    /// Number of `is_connected` queries served.
    pub fn connectivity_queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Forget the recorded calls.
    pub fn clear(&self) {
        self.inner.lock().log.clear();
    }

    fn record(&self, inner: &mut Inner, call: TransportCall, frame: Frame) {
        if inner.log.len() == self.capacity {
            inner.log.pop_front();
        }
        inner.log.push_back(Recorded {
            call,
            wire: frame.encode(),
        });
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HapticTransport for SimulatedTransport {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn is_connected(&self, position: PhysicalPosition) -> bool {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().connected.contains(&position)
    }

    fn play(&self, command: &PlayCommand) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(TransportError::Communication("simulated link failure".to_string()));
        }
        if !inner.connected.contains(&command.position) {
            return Err(TransportError::NotConnected(command.position));
        }
        let frame = Frame::play(command);
        self.record(&mut inner, TransportCall::Play(command.clone()), frame);
        Ok(())
    }

    fn stop(&self, key: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        self.record(&mut inner, TransportCall::Stop(key.to_string()), Frame::stop(Some(key)));
        debug!("Simulated stop '{}'", key);
        Ok(())
    }

    fn stop_all(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        self.record(&mut inner, TransportCall::StopAll, Frame::stop(None));
        debug!("Simulated stop of all patterns");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}
