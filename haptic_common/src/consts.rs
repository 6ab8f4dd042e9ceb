//! System-wide constants for the haptic pipeline.
//!
//! Single source of truth for timing windows and motor limits.
//! Configuration values default to these; everything else reads them directly.

use static_assertions::const_assert;
use std::time::Duration;

/// Default sampling tick interval in milliseconds (100 Hz).
pub const TICK_INTERVAL_MS: u64 = 10;

/// Bounded wait for the sampling thread to exit after a stop request.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum interval between two submissions sharing a rate-limit key.
pub const MIN_SUBMIT_INTERVAL_MS: u64 = 10;

/// Hardware stability floor for play durations.
pub const MIN_DURATION_MS: u16 = 40;

/// Play duration requested by the sampling loop for each frame.
pub const FRAME_DURATION_MS: u16 = 100;

/// Submission records older than this are purged by the housekeeping sweep.
pub const SUBMISSION_STALE_AFTER: Duration = Duration::from_secs(5);

/// Number of submissions between two housekeeping sweeps.
pub const SUBMISSION_SWEEP_EVERY: u64 = 1000;

/// Remote samples older than this are treated as absent.
pub const REMOTE_STALE_AFTER: Duration = Duration::from_millis(500);

/// Minimum spacing between two remote-cache eviction sweeps.
pub const REMOTE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Lifetime of a cached connectivity answer from the transport.
pub const CONNECTION_CACHE_TTL: Duration = Duration::from_secs(1);

/// Delay between two point-provisioning readiness polls.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of readiness polls before a registration attempt gives up (~5 s).
pub const READINESS_RETRIES: u32 = 50;

/// Largest motor array of any physical position (full vest).
pub const MAX_MOTORS: usize = 40;

/// Motor count of each vest half; torso indices at or above it belong to the back.
pub const VEST_HALF_MOTORS: u8 = 20;

/// Frames between two diagnostic summaries of the sampling loop.
pub const DIAGNOSTIC_EVERY_FRAMES: u64 = 1000;

/// Prefix of generated device keys.
pub const DEVICE_KEY_PREFIX: &str = "haptic";

const_assert!(VEST_HALF_MOTORS as usize * 2 == MAX_MOTORS);
const_assert!(MAX_MOTORS <= u8::MAX as usize);
const_assert!(MIN_SUBMIT_INTERVAL_MS <= TICK_INTERVAL_MS);
