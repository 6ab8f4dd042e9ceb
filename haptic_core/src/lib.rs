//! # Haptic Core Library
//!
//! Real-time haptic signal synthesis and submission.
//!
//! Every tick the sampling loop reads the host's haptic points, turns their
//! force, pain, temperature and vibration channels into motor intensities and
//! submits one frame per device through a rate-limited gateway. Devices can
//! come and go at runtime; the device registry provisions host points for
//! newly connected devices and cleans up after disconnected ones.
//!
//! # Module Structure
//!
//! - [`runtime`] - `HapticRuntime` context owning every component
//! - [`scheduler`] - Fixed-interval sampling thread and per-tick worker
//! - [`synth`] - Per-point intensity synthesis
//! - [`mapper`] - Logical ↔ physical position table and motor packing
//! - [`groups`] - Device groups, device keys and binding generations
//! - [`gateway`] - Rate-limited, connectivity-guarded submission
//! - [`registry`] - Hot-plug state machine and connectivity cache
//! - [`initializers`] - Position → host initializer table
//! - [`remote`] - Cache of externally supplied point samples
//! - [`drivers`] - Simulation transport and demo host
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          HapticRuntime                           │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────────────────┐  │
//! │  │ PointSource  │───►│  Sampling    │───►│ SubmissionGateway  │──┼──► HapticTransport
//! │  │ RemoteCache  │    │  Scheduler   │    │  (rate limit)      │  │
//! │  └──────────────┘    └──────────────┘    └─────────┬──────────┘  │
//! │         ▲                                          │             │
//! │         │ purge         ┌──────────────┐           ▼             │
//! │         └───────────────│DeviceRegistry│◄── connectivity events  │
//! │                         └──────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod drivers;
pub mod gateway;
pub mod groups;
pub mod initializers;
pub mod mapper;
pub mod registry;
pub mod remote;
pub mod runtime;
pub mod scheduler;
pub mod synth;

// Re-export key types for convenience
pub use crate::gateway::{SubmissionGateway, SubmitOutcome};
pub use crate::registry::{DeviceRegistry, RegistrationError, RegistrationState};
pub use crate::remote::{RemoteSample, RemoteSampleCache};
pub use crate::runtime::{Collaborators, HapticRuntime, RuntimeDiagnostics, RuntimeError};
