//! Demo host: an animated point source and its provisioner.

use crate::mapper::PositionMapper;
use haptic_common::host::{PointOwner, PointProvisioner, PointSample, PointSource, ProvisionError};
use haptic_common::position::{LogicalPosition, Side};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// In-memory host point store.
///
/// Each added position contributes one point per motor of its device, with
/// motor indices `0..n` in order.
#[derive(Debug, Default)]
pub struct DemoPointSource {
    points: RwLock<Vec<PointSample>>,
}

impl DemoPointSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source pre-populated with `positions`.
    pub fn with_positions(positions: &[LogicalPosition]) -> Self {
        let source = Self::new();
        for &position in positions {
            source.add_position(position);
        }
        source
    }

    /// Add the points of `position`; returns how many were added.
    ///
    /// Adding a position that already has points adds nothing.
    pub fn add_position(&self, position: LogicalPosition) -> usize {
        let mut points = self.points.write();
        if points.iter().any(|p| p.position == position) {
            return 0;
        }
        let mapper = PositionMapper;
        let count = mapper.motor_count(mapper.to_physical(position));
        points.extend((0..count).map(|index| PointSample::new(position, index as u8)));
        count
    }

    /// Logical positions that have points, in insertion order.
    pub fn positions(&self) -> Vec<LogicalPosition> {
        let mut positions = Vec::new();
        for point in self.points.read().iter() {
            if !positions.contains(&point.position) {
                positions.push(point.position);
            }
        }
        positions
    }

    /// Ids of the points of `position`.
    pub fn ids_of(&self, position: LogicalPosition) -> Vec<usize> {
        self.points
            .read()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.position == position)
            .map(|(id, _)| id)
            .collect()
    }

    /// Modify the point at `id`; returns `false` if it does not exist.
    pub fn update(&self, id: usize, f: impl FnOnce(&mut PointSample)) -> bool {
        match self.points.write().get_mut(id) {
            Some(point) => {
                f(point);
                true
            }
            None => false,
        }
    }

    /// Hand every point of `position` to `owner`.
    pub fn set_owner(&self, position: LogicalPosition, owner: PointOwner) {
        for point in self.points.write().iter_mut() {
            if point.position == position {
                point.owner = owner;
            }
        }
    }

    /// Silence every point.
    pub fn silence(&self) {
        for point in self.points.write().iter_mut() {
            point.force = 0.0;
            point.pain = 0.0;
            point.temperature = 0.0;
            point.vibration = 0.0;
        }
    }

    /// Drive every local point with a slowly moving pattern at time `t` [s].
    ///
    /// Points cycle through the four channels by index so that every
    /// synthesizer path is exercised.
    pub fn animate(&self, t: f32) {
        for (id, point) in self.points.write().iter_mut().enumerate() {
            if point.owner != PointOwner::Local {
                continue;
            }
            let wave = 0.5 + 0.5 * (t * 0.8 + id as f32 * 0.35).sin();
            point.force = 0.0;
            point.pain = 0.0;
            point.temperature = 0.0;
            point.vibration = 0.0;
            match id % 4 {
                0 => point.force = wave,
                1 => point.pain = wave * 0.6,
                2 => point.temperature = (wave * 2.0 - 1.0) * 80.0,
                _ => point.vibration = wave,
            }
        }
    }
}

impl PointSource for DemoPointSource {
    fn point_count(&self) -> usize {
        self.points.read().len()
    }

    fn point_at(&self, id: usize) -> Option<PointSample> {
        self.points.read().get(id).copied()
    }
}

/// Provisioner adding demo points for a region.
#[derive(Debug)]
pub struct DemoProvisioner {
    source: Arc<DemoPointSource>,
    ready: AtomicBool,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl DemoProvisioner {
    /// Ready provisioner writing into `source`.
    pub fn new(source: Arc<DemoPointSource>) -> Self {
        Self {
            source,
            ready: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Toggle readiness.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every provisioning call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of provisioning calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn provision(&self, position: LogicalPosition) -> Result<(), ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.ready.load(Ordering::SeqCst) {
            return Err(ProvisionError::NotReady);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProvisionError::Failed(format!("cannot create {position} points")));
        }
        let added = self.source.add_position(position);
        info!("Provisioned {} demo points for {}", added, position);
        Ok(())
    }
}

impl PointProvisioner for DemoProvisioner {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn provision_head(&self) -> Result<(), ProvisionError> {
        self.provision(LogicalPosition::Head)
    }

    fn provision_torso(&self) -> Result<(), ProvisionError> {
        self.provision(LogicalPosition::Torso)
    }

    fn provision_arm(&self, side: Side) -> Result<(), ProvisionError> {
        self.provision(LogicalPosition::Arm(side))
    }

    fn provision_hand(&self, side: Side) -> Result<(), ProvisionError> {
        self.provision(LogicalPosition::Hand(side))
    }

    fn provision_foot(&self, side: Side) -> Result<(), ProvisionError> {
        self.provision(LogicalPosition::Foot(side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_get_one_point_per_motor() {
        let source = DemoPointSource::with_positions(&[
            LogicalPosition::Foot(Side::Left),
            LogicalPosition::Torso,
        ]);
        assert_eq!(source.point_count(), 3 + 40);
        assert_eq!(source.ids_of(LogicalPosition::Foot(Side::Left)), vec![0, 1, 2]);
        assert_eq!(source.point_at(42).unwrap().motor_index, 39);
        assert_eq!(source.add_position(LogicalPosition::Torso), 0);
    }

    #[test]
    fn animate_skips_remote_points() {
        let source = DemoPointSource::with_positions(&[LogicalPosition::Head]);
        source.set_owner(LogicalPosition::Head, PointOwner::Remote);
        source.animate(1.0);
        assert!((0..source.point_count()).all(|id| {
            source.point_at(id).unwrap().total_intensity() == 0.0
        }));

        source.set_owner(LogicalPosition::Head, PointOwner::Local);
        source.animate(1.0);
        assert!(source.point_at(0).unwrap().force > 0.0);
    }

    #[test]
    fn provisioner_adds_points_and_counts_calls() {
        let source = Arc::new(DemoPointSource::new());
        let provisioner = DemoProvisioner::new(Arc::clone(&source));

        provisioner.provision_hand(Side::Right).unwrap();
        assert_eq!(source.positions(), vec![LogicalPosition::Hand(Side::Right)]);

        provisioner.set_failing(true);
        assert!(provisioner.provision_head().is_err());
        assert_eq!(provisioner.calls(), 2);
        assert_eq!(source.point_count(), 6);
    }
}
