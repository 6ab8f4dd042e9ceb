//! Device groups and point bindings.
//!
//! A [`DeviceGroup`] collects the runtime state of every point that drives one
//! logical body position, together with the device key its frames are
//! submitted under. Groups are built from the host point source when the
//! sampling worker starts and rebuilt whenever the [`BindingsGeneration`]
//! moves (a device registration created new points).

use crate::mapper::PositionMapper;
use crate::synth::PointRuntimeState;
use haptic_common::consts::DEVICE_KEY_PREFIX;
use haptic_common::host::PointSource;
use haptic_common::position::{LogicalPosition, PhysicalPosition};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Device key of the group driving `position`.
pub fn device_key(position: LogicalPosition) -> String {
    format!("{DEVICE_KEY_PREFIX}_{position}")
}

/// Key of one half of a split torso submission.
///
/// `#` never appears in a device key, so a split half cannot share a channel
/// with the group of the explicit vest half.
pub fn split_key(key: &str, half: PhysicalPosition) -> String {
    match half {
        PhysicalPosition::VestFront => format!("{key}#front"),
        PhysicalPosition::VestBack => format!("{key}#back"),
        _ => key.to_string(),
    }
}

/// Monotonic counter of point-binding changes.
///
/// Bumped by the device registry after the host created new points; the
/// sampling worker compares it once per tick.
#[derive(Debug, Default)]
pub struct BindingsGeneration(AtomicU64);

impl BindingsGeneration {
    /// Counter starting at generation 0.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current generation.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Request a rebuild of the point bindings.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Points of one logical position and their submission channel.
#[derive(Debug, Clone)]
pub struct DeviceGroup {
    /// Host classification shared by all points.
    pub logical: LogicalPosition,
    /// Device the group is submitted to (before any torso split).
    pub physical: PhysicalPosition,
    /// Submission channel of the group.
    pub device_key: String,
    /// Runtime state of the member points, in host order.
    pub points: Vec<PointRuntimeState>,
    /// Whether the last submitted frame had any active motor.
    pub was_active: bool,
}

/// Group every point of `source` by logical position.
///
/// Groups come out in a stable position order; points keep host order.
pub fn build_groups(source: &dyn PointSource, mapper: &PositionMapper) -> Vec<DeviceGroup> {
    let mut by_position: BTreeMap<LogicalPosition, Vec<PointRuntimeState>> = BTreeMap::new();
    for id in 0..source.point_count() {
        if let Some(sample) = source.point_at(id) {
            by_position
                .entry(sample.position)
                .or_default()
                .push(PointRuntimeState::new(id, sample.motor_index));
        }
    }

    by_position
        .into_iter()
        .map(|(logical, points)| DeviceGroup {
            logical,
            physical: mapper.to_physical(logical),
            device_key: device_key(logical),
            points,
            was_active: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use haptic_common::host::PointSample;
    use haptic_common::position::Side;

    struct FixedPoints(Vec<PointSample>);

    impl PointSource for FixedPoints {
        fn point_count(&self) -> usize {
            self.0.len()
        }

        fn point_at(&self, id: usize) -> Option<PointSample> {
            self.0.get(id).copied()
        }
    }

    #[test]
    fn groups_by_logical_position() {
        let source = FixedPoints(vec![
            PointSample::new(LogicalPosition::Foot(Side::Left), 0),
            PointSample::new(LogicalPosition::Head, 4),
            PointSample::new(LogicalPosition::Foot(Side::Left), 2),
        ]);
        let groups = build_groups(&source, &PositionMapper);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].logical, LogicalPosition::Head);
        assert_eq!(groups[0].device_key, "haptic_head");
        assert_eq!(groups[0].points.len(), 1);
        assert_eq!(groups[0].points[0].point_id, 1);

        let foot = &groups[1];
        assert_eq!(foot.physical, PhysicalPosition::Foot(Side::Left));
        let ids: Vec<usize> = foot.points.iter().map(|p| p.point_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(foot.points[1].motor_index, 2);
    }

    #[test]
    fn device_keys_are_unique() {
        let keys: std::collections::HashSet<String> =
            LogicalPosition::ALL.iter().map(|&p| device_key(p)).collect();
        assert_eq!(keys.len(), LogicalPosition::ALL.len());
        assert_eq!(split_key("haptic_torso", PhysicalPosition::VestBack), "haptic_torso#back");
    }

    #[test]
    fn split_keys_never_collide_with_device_keys() {
        let keys: std::collections::HashSet<String> =
            LogicalPosition::ALL.iter().map(|&p| device_key(p)).collect();
        for half in [PhysicalPosition::VestFront, PhysicalPosition::VestBack] {
            let split = split_key(&device_key(LogicalPosition::Torso), half);
            assert!(!keys.contains(&split), "{split} collides with a device key");
        }
    }

    #[test]
    fn generation_bumps() {
        let generation = BindingsGeneration::new();
        assert_eq!(generation.current(), 0);
        assert_eq!(generation.bump(), 1);
        assert_eq!(generation.current(), 1);
    }
}
