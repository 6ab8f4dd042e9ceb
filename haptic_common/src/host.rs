//! Host collaborator traits.
//!
//! The host engine owns the haptic points. Once per tick the sampling loop
//! reads them through [`PointSource`]; device registration asks the host to
//! create points for a newly connected position through [`PointProvisioner`].

use crate::position::{LogicalPosition, Side};
use thiserror::Error;

/// Who produces the sensations of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointOwner {
    /// Driven by the local host simulation.
    #[default]
    Local,
    /// Driven by samples injected from a remote source.
    Remote,
}

/// Read-only per-tick snapshot of one haptic point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    /// Host classification of the point.
    pub position: LogicalPosition,
    /// Motor slot on the device the point maps to.
    pub motor_index: u8,
    /// Pressure, 0..=1.
    pub force: f32,
    /// Pain, 0..=1.
    pub pain: f32,
    /// Signed temperature deviation, -100..=100.
    pub temperature: f32,
    /// Vibration strength, 0..=1.
    pub vibration: f32,
    /// Source of the sensations.
    pub owner: PointOwner,
}

impl PointSample {
    /// A silent local point.
    pub fn new(position: LogicalPosition, motor_index: u8) -> Self {
        Self {
            position,
            motor_index,
            force: 0.0,
            pain: 0.0,
            temperature: 0.0,
            vibration: 0.0,
            owner: PointOwner::Local,
        }
    }

    /// Strongest normalized channel, as reported to diagnostics.
    pub fn total_intensity(&self) -> f32 {
        self.force
            .max(self.pain)
            .max((self.temperature.abs() / 100.0).min(1.0))
            .max(self.vibration)
    }
}

/// Per-tick read access to the host's haptic points.
///
/// Point ids are the slot indices `0..point_count()`; they stay stable for the
/// lifetime of a binding generation.
pub trait PointSource: Send + Sync {
    /// Number of points currently provided by the host.
    fn point_count(&self) -> usize;

    /// Snapshot of the point at `id`, `None` if the slot vanished.
    fn point_at(&self, id: usize) -> Option<PointSample>;
}

/// Error raised by the host while provisioning points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    /// The provisioning subsystem is not available yet.
    #[error("point provisioning not ready")]
    NotReady,

    /// The host initializer failed.
    #[error("point provisioning failed: {0}")]
    Failed(String),
}

/// Host-side creation of haptic points for a body region.
///
/// One routine per region; the registry selects the routine through its
/// initializer table rather than by inspecting host objects.
pub trait PointProvisioner: Send + Sync {
    /// Whether the host can create points right now.
    fn is_ready(&self) -> bool;

    /// Create the head points.
    fn provision_head(&self) -> Result<(), ProvisionError>;

    /// Create the torso points (front and back).
    fn provision_torso(&self) -> Result<(), ProvisionError>;

    /// Create the points of one forearm.
    fn provision_arm(&self, side: Side) -> Result<(), ProvisionError>;

    /// Create the points of one hand.
    fn provision_hand(&self, side: Side) -> Result<(), ProvisionError>;

    /// Create the points of one foot.
    fn provision_foot(&self, side: Side) -> Result<(), ProvisionError>;
}
