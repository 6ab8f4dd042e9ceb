//! Collaborator implementations bundled with the core.
//!
//! - [`simulation`] - In-memory transport and demo host for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `HapticTransport` from `haptic_common::transport`
//! 3. Hand an `Arc` of it to `HapticRuntime` through `Collaborators`

pub mod simulation;
