//! Haptic Common Library
//!
//! This crate provides the shared vocabulary of the haptic pipeline: timing
//! constants, configuration loading, body position tags, the traits the host
//! and the hardware transport implement, and the compact wire codec.
//!
//! # Module Structure
//!
//! - [`consts`] - Timing windows, motor limits and other numeric constants
//! - [`config`] - Configuration loading traits and types
//! - [`position`] - Logical (host) and physical (device) position tags
//! - [`host`] - Point source and point provisioning collaborator traits
//! - [`transport`] - Hardware transport collaborator trait and play commands
//! - [`codec`] - Key hashing and binary frame encoding
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use haptic_common::prelude::*;
//!
//! let config = HapticConfig::default();
//! assert!(!config.features.enable_hotplug);
//! ```

pub mod codec;
pub mod config;
pub mod consts;
pub mod host;
pub mod position;
pub mod prelude;
pub mod transport;
