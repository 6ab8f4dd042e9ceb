//! Prelude module for common re-exports.
//!
//! ```rust
//! use haptic_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, FeatureFlags, HapticConfig, LogLevel, SharedConfig, TimingConfig,
};

// ─── Positions ──────────────────────────────────────────────────────
pub use crate::position::{LogicalPosition, PhysicalPosition, Side};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::host::{PointOwner, PointProvisioner, PointSample, PointSource, ProvisionError};
pub use crate::transport::{
    ConnectivityEvent, HapticTransport, MotorArray, PlayCommand, TransportError,
};

// ─── Wire ───────────────────────────────────────────────────────────
pub use crate::codec::{Frame, key_hash};
