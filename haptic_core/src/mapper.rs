//! Logical ↔ physical position translation and motor packing.

use haptic_common::consts::MAX_MOTORS;
use haptic_common::position::{LogicalPosition, PhysicalPosition, Side};
use haptic_common::transport::MotorArray;

/// Logical position ↔ physical position, one row per pair.
const POSITION_TABLE: [(LogicalPosition, PhysicalPosition); 10] = [
    (LogicalPosition::Head, PhysicalPosition::Head),
    (LogicalPosition::Torso, PhysicalPosition::Vest),
    (LogicalPosition::TorsoFront, PhysicalPosition::VestFront),
    (LogicalPosition::TorsoBack, PhysicalPosition::VestBack),
    (LogicalPosition::Arm(Side::Left), PhysicalPosition::Forearm(Side::Left)),
    (LogicalPosition::Arm(Side::Right), PhysicalPosition::Forearm(Side::Right)),
    (LogicalPosition::Hand(Side::Left), PhysicalPosition::Hand(Side::Left)),
    (LogicalPosition::Hand(Side::Right), PhysicalPosition::Hand(Side::Right)),
    (LogicalPosition::Foot(Side::Left), PhysicalPosition::Foot(Side::Left)),
    (LogicalPosition::Foot(Side::Right), PhysicalPosition::Foot(Side::Right)),
];

/// Translates between host positions and device positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionMapper;

impl PositionMapper {
    /// Device addressed by points of `position`.
    pub fn to_physical(&self, position: LogicalPosition) -> PhysicalPosition {
        POSITION_TABLE
            .iter()
            .find(|(logical, _)| *logical == position)
            .map(|&(_, physical)| physical)
            .unwrap_or(PhysicalPosition::Vest)
    }

    /// Host classification of points driving `position`.
    pub fn to_logical(&self, position: PhysicalPosition) -> LogicalPosition {
        POSITION_TABLE
            .iter()
            .find(|(_, physical)| *physical == position)
            .map(|&(logical, _)| logical)
            .unwrap_or(LogicalPosition::Torso)
    }

    /// Number of motors on the device at `position`.
    pub const fn motor_count(&self, position: PhysicalPosition) -> usize {
        match position {
            PhysicalPosition::Vest => MAX_MOTORS,
            PhysicalPosition::VestFront | PhysicalPosition::VestBack => 20,
            PhysicalPosition::Head => 20,
            PhysicalPosition::Forearm(_) | PhysicalPosition::Hand(_) => 6,
            PhysicalPosition::Foot(_) => 3,
        }
    }

    /// Whether points of `logical` feed the device at `physical`.
    ///
    /// The whole-torso points feed the unified vest and both vest halves.
    pub fn feeds(&self, logical: LogicalPosition, physical: PhysicalPosition) -> bool {
        if self.to_physical(logical) == physical {
            return true;
        }
        matches!(
            (logical, physical),
            (
                LogicalPosition::Torso,
                PhysicalPosition::VestFront | PhysicalPosition::VestBack
            )
        )
    }

    /// Pack a sparse `(motor index, intensity)` list into a dense motor array.
    ///
    /// Intensities are clamped to 0..=100. Indices outside the device's motor
    /// range are dropped. Later duplicates win.
    pub fn pack(&self, position: PhysicalPosition, points: &[(u8, u8)]) -> MotorArray {
        let count = self.motor_count(position);
        let mut motors = MotorArray::new();
        for _ in 0..count {
            let _ = motors.push(0);
        }
        for &(index, intensity) in points {
            if let Some(slot) = motors.get_mut(index as usize) {
                *slot = intensity.min(100);
            }
        }
        motors
    }
}
