//! Body position tags.
//!
//! The host classifies every haptic point with a [`LogicalPosition`] when it
//! hands the point over. Hardware is addressed by [`PhysicalPosition`]. The
//! translation between the two lives in `haptic_core::mapper`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Body side of a limb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Left limb.
    Left,
    /// Right limb.
    Right,
}

/// Host-side classification of a haptic point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalPosition {
    /// Head.
    Head,
    /// Whole torso, indices 0..40 across front and back.
    Torso,
    /// Front half of the torso.
    TorsoFront,
    /// Back half of the torso.
    TorsoBack,
    /// Arm (forearm).
    Arm(Side),
    /// Hand.
    Hand(Side),
    /// Foot.
    Foot(Side),
}

impl LogicalPosition {
    /// Every logical position.
    pub const ALL: [LogicalPosition; 10] = [
        Self::Head,
        Self::Torso,
        Self::TorsoFront,
        Self::TorsoBack,
        Self::Arm(Side::Left),
        Self::Arm(Side::Right),
        Self::Hand(Side::Left),
        Self::Hand(Side::Right),
        Self::Foot(Side::Left),
        Self::Foot(Side::Right),
    ];

    /// Stable lowercase name, used in device keys and on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Torso => "torso",
            Self::TorsoFront => "torso_front",
            Self::TorsoBack => "torso_back",
            Self::Arm(Side::Left) => "left_arm",
            Self::Arm(Side::Right) => "right_arm",
            Self::Hand(Side::Left) => "left_hand",
            Self::Hand(Side::Right) => "right_hand",
            Self::Foot(Side::Left) => "left_foot",
            Self::Foot(Side::Right) => "right_foot",
        }
    }
}

impl fmt::Display for LogicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a position name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown position: {0}")]
pub struct UnknownPosition(pub String);

impl FromStr for LogicalPosition {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_string()))
    }
}

/// Addressable hardware unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalPosition {
    /// Head band.
    Head,
    /// Unified vest (front and back on one channel).
    Vest,
    /// Front vest sub-device.
    VestFront,
    /// Back vest sub-device.
    VestBack,
    /// Forearm sleeve.
    Forearm(Side),
    /// Glove.
    Hand(Side),
    /// Foot pad.
    Foot(Side),
}

impl PhysicalPosition {
    /// Every physical position.
    pub const ALL: [PhysicalPosition; 10] = [
        Self::Head,
        Self::Vest,
        Self::VestFront,
        Self::VestBack,
        Self::Forearm(Side::Left),
        Self::Forearm(Side::Right),
        Self::Hand(Side::Left),
        Self::Hand(Side::Right),
        Self::Foot(Side::Left),
        Self::Foot(Side::Right),
    ];

    /// One-byte identifier used on the wire.
    pub const fn id(&self) -> u8 {
        match self {
            Self::Vest => 0,
            Self::Forearm(Side::Left) => 1,
            Self::Forearm(Side::Right) => 2,
            Self::Head => 3,
            Self::Hand(Side::Left) => 4,
            Self::Hand(Side::Right) => 5,
            Self::Foot(Side::Left) => 6,
            Self::Foot(Side::Right) => 7,
            Self::VestFront => 201,
            Self::VestBack => 202,
        }
    }

    /// Inverse of [`PhysicalPosition::id`].
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }

    /// Stable lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Vest => "vest",
            Self::VestFront => "vest_front",
            Self::VestBack => "vest_back",
            Self::Forearm(Side::Left) => "forearm_l",
            Self::Forearm(Side::Right) => "forearm_r",
            Self::Hand(Side::Left) => "hand_l",
            Self::Hand(Side::Right) => "hand_r",
            Self::Foot(Side::Left) => "foot_l",
            Self::Foot(Side::Right) => "foot_r",
        }
    }
}

impl fmt::Display for PhysicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhysicalPosition {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_string()))
    }
}
