//! Position → host initializer table.
//!
//! Provides an `InitializerTable` mapping each physical device position to the
//! host routine that creates its points. Selection is a plain table lookup;
//! the registry never inspects host objects to decide what to call.

use haptic_common::host::{PointProvisioner, ProvisionError};
use haptic_common::position::{PhysicalPosition, Side};
use std::collections::HashMap;

/// Host routine creating the points of one device position.
pub type Initializer = fn(&dyn PointProvisioner) -> Result<(), ProvisionError>;

/// Table of per-position initializers.
///
/// Constructed at startup, populated via `register()`, and handed to the
/// device registry by value.
#[derive(Debug, Clone)]
pub struct InitializerTable {
    initializers: HashMap<PhysicalPosition, Initializer>,
}

impl InitializerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            initializers: HashMap::new(),
        }
    }

    /// Table covering every known device position.
    ///
    /// The unified vest and both vest halves share the torso initializer.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(PhysicalPosition::Head, init_head);
        table.register(PhysicalPosition::Vest, init_torso);
        table.register(PhysicalPosition::VestFront, init_torso);
        table.register(PhysicalPosition::VestBack, init_torso);
        table.register(PhysicalPosition::Forearm(Side::Left), init_forearm_left);
        table.register(PhysicalPosition::Forearm(Side::Right), init_forearm_right);
        table.register(PhysicalPosition::Hand(Side::Left), init_hand_left);
        table.register(PhysicalPosition::Hand(Side::Right), init_hand_right);
        table.register(PhysicalPosition::Foot(Side::Left), init_foot_left);
        table.register(PhysicalPosition::Foot(Side::Right), init_foot_right);
        table
    }

    /// Register an initializer.
    ///
    /// # Panics
    /// Panics if the position already has an initializer.
    pub fn register(&mut self, position: PhysicalPosition, initializer: Initializer) {
        if self.initializers.contains_key(&position) {
            panic!("Initializer for '{position}' is already registered");
        }
        self.initializers.insert(position, initializer);
    }

    /// Initializer of `position`, if any.
    pub fn get(&self, position: PhysicalPosition) -> Option<Initializer> {
        self.initializers.get(&position).copied()
    }

    /// Positions that have an initializer, in stable order.
    pub fn positions(&self) -> Vec<PhysicalPosition> {
        let mut positions: Vec<_> = self.initializers.keys().copied().collect();
        positions.sort();
        positions
    }
}

impl Default for InitializerTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn init_head(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_head()
}

fn init_torso(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_torso()
}

fn init_forearm_left(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_arm(Side::Left)
}

fn init_forearm_right(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_arm(Side::Right)
}

fn init_hand_left(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_hand(Side::Left)
}

fn init_hand_right(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_hand(Side::Right)
}

fn init_foot_left(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_foot(Side::Left)
}

fn init_foot_right(host: &dyn PointProvisioner) -> Result<(), ProvisionError> {
    host.provision_foot(Side::Right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CallLog(Mutex<Vec<String>>);

    impl CallLog {
        fn push(&self, call: &str) -> Result<(), ProvisionError> {
            self.0.lock().push(call.to_string());
            Ok(())
        }
    }

    impl PointProvisioner for CallLog {
        fn is_ready(&self) -> bool {
            true
        }

        fn provision_head(&self) -> Result<(), ProvisionError> {
            self.push("head")
        }

        fn provision_torso(&self) -> Result<(), ProvisionError> {
            self.push("torso")
        }

        fn provision_arm(&self, side: Side) -> Result<(), ProvisionError> {
            self.push(&format!("arm_{side:?}"))
        }

        fn provision_hand(&self, side: Side) -> Result<(), ProvisionError> {
            self.push(&format!("hand_{side:?}"))
        }

        fn provision_foot(&self, side: Side) -> Result<(), ProvisionError> {
            self.push(&format!("foot_{side:?}"))
        }
    }

    #[test]
    fn defaults_cover_every_position() {
        let table = InitializerTable::with_defaults();
        assert_eq!(table.positions().len(), PhysicalPosition::ALL.len());
        for position in PhysicalPosition::ALL {
            assert!(table.get(position).is_some(), "missing {position}");
        }
    }

    #[test]
    fn dispatch_selects_region_routine() {
        let table = InitializerTable::with_defaults();
        let host = CallLog::default();

        let init = table.get(PhysicalPosition::VestBack).expect("vest back");
        init(&host).expect("torso");
        let init = table.get(PhysicalPosition::Foot(Side::Right)).expect("foot");
        init(&host).expect("foot");

        assert_eq!(*host.0.lock(), vec!["torso", "foot_Right"]);
    }

    #[test]
    fn empty_table_has_no_initializers() {
        let table = InitializerTable::new();
        assert!(table.get(PhysicalPosition::Head).is_none());
        assert!(table.positions().is_empty());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut table = InitializerTable::new();
        table.register(PhysicalPosition::Head, init_head);
        table.register(PhysicalPosition::Head, init_head);
    }
}
