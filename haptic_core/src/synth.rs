//! Per-point intensity synthesis.
//!
//! Four sensation channels are turned into one motor intensity by
//! priority-max composition, evaluated in a fixed order:
//!
//! | Channel | Waveform |
//! |---------|----------|
//! | force | passthrough |
//! | pain | shared throbbing `|sin φ|² · gate(sin φ/2) · √pain` + jitter, φ wraps at 4π |
//! | temperature | smooth value noise driven by a per-point phase |
//! | vibration | per-point sine, frequency `lerp(0.1, 10, v)` Hz |
//!
//! The pain phase is global so that every point throbs in sync.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};

/// Pain throb rate at zero pain [Hz].
const PAIN_RATE_MIN: f32 = 1.333;
/// Pain throb rate at full pain [Hz].
const PAIN_RATE_MAX: f32 = 2.333;
/// Pain phase wraps after two sine periods.
const PAIN_PHASE_WRAP: f32 = 4.0 * PI;
/// Jitter amplitude on top of the pain throb.
const PAIN_JITTER: f32 = 0.1;
/// Temperature phase advance per tick at full temperature.
const TEMPERATURE_PHASE_RATE: f32 = 4.0;
/// Temperature phase wrap, keeps the accumulator precise.
const TEMPERATURE_PHASE_WRAP: f32 = 20_000.0;
/// Temperature magnitude that maps to full intensity.
const TEMPERATURE_FULL_SCALE: f32 = 100.0;
/// Vibration frequency at zero strength [Hz].
const VIBRATION_RATE_MIN: f32 = 0.1;
/// Vibration frequency at full strength [Hz].
const VIBRATION_RATE_MAX: f32 = 10.0;

/// Raw sensation inputs of one point for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sensation {
    /// Pressure, 0..=1.
    pub force: f32,
    /// Pain, 0..=1.
    pub pain: f32,
    /// Signed temperature deviation, -100..=100.
    pub temperature: f32,
    /// Vibration strength, 0..=1.
    pub vibration: f32,
}

impl Sensation {
    /// Replace non-finite values with 0 and clamp every channel to its range.
    pub fn sanitized(self) -> Self {
        Self {
            force: unit(self.force),
            pain: unit(self.pain),
            temperature: finite(self.temperature)
                .clamp(-TEMPERATURE_FULL_SCALE, TEMPERATURE_FULL_SCALE),
            vibration: unit(self.vibration),
        }
    }
}

/// Oscillator state of one tracked point.
///
/// Owned by the sampling thread; created when the point joins a device group.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRuntimeState {
    /// Slot of the point in the host point source.
    pub point_id: usize,
    /// Motor slot on the device.
    pub motor_index: u8,
    temperature_phase: f32,
    vibration_phase: f32,
}

impl PointRuntimeState {
    /// Fresh state with zeroed phases.
    pub fn new(point_id: usize, motor_index: u8) -> Self {
        Self {
            point_id,
            motor_index,
            temperature_phase: 0.0,
            vibration_phase: 0.0,
        }
    }

    /// Temperature phase accumulator.
    pub fn temperature_phase(&self) -> f32 {
        self.temperature_phase
    }

    /// Vibration phase accumulator.
    pub fn vibration_phase(&self) -> f32 {
        self.vibration_phase
    }
}

/// Oscillator-based intensity synthesizer.
#[derive(Debug)]
pub struct SignalSynthesizer {
    pain_phase: f32,
    rng: SmallRng,
}

impl SignalSynthesizer {
    /// Synthesizer with an entropy-seeded jitter source.
    pub fn new() -> Self {
        Self {
            pain_phase: 0.0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Synthesizer with a reproducible jitter source.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            pain_phase: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Shared pain phase, in `[0, 4π)`.
    pub fn pain_phase(&self) -> f32 {
        self.pain_phase
    }

    /// Advance the shared pain phase once per tick.
    ///
    /// The throb rate follows the strongest pain across all points.
    pub fn advance_pain(&mut self, dt: f32, max_pain: f32) {
        let rate = lerp(PAIN_RATE_MIN, PAIN_RATE_MAX, unit(max_pain));
        self.pain_phase = (self.pain_phase + TAU * finite(dt).max(0.0) * rate)
            .rem_euclid(PAIN_PHASE_WRAP);
    }

    /// Advance the point's oscillators and return its intensity in `[0, 1]`.
    pub fn synthesize(&mut self, state: &mut PointRuntimeState, input: Sensation, dt: f32) -> f32 {
        let input = input.sanitized();
        let dt = finite(dt).max(0.0);
        let mut intensity = 0.0f32;

        // Force
        intensity = intensity.max(input.force);

        // Pain
        if input.pain > 0.0 {
            let s = self.pain_phase.sin();
            let gate = sign((self.pain_phase * 0.5).sin()).max(0.0);
            let throb = s * s * gate * input.pain.sqrt();
            let jitter =
                (self.rng.r#gen::<f32>() * 2.0 - 1.0) * PAIN_JITTER * input.pain.powf(0.25);
            intensity = intensity.max(throb + jitter);
        }

        // Temperature
        let magnitude = input.temperature.abs() / TEMPERATURE_FULL_SCALE;
        state.temperature_phase = (state.temperature_phase + magnitude * TEMPERATURE_PHASE_RATE)
            .rem_euclid(TEMPERATURE_PHASE_WRAP);
        if magnitude > 0.0 {
            intensity = intensity.max(smooth_noise(state.temperature_phase) * magnitude.min(1.0));
        }

        // Vibration
        let rate = lerp(VIBRATION_RATE_MIN, VIBRATION_RATE_MAX, input.vibration);
        state.vibration_phase = (state.vibration_phase + TAU * dt * rate).rem_euclid(TAU);
        if input.vibration > 0.0 {
            let wave = state.vibration_phase.sin() * 0.5 + 0.5;
            intensity = intensity.max(wave * input.vibration);
        }

        intensity.clamp(0.0, 1.0)
    }
}

impl Default for SignalSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Quantize an intensity to the legacy 0..=100 motor range.
pub fn quantize(intensity: f32) -> u8 {
    (unit(intensity) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Deterministic 1-D value noise in `[0, 1]`, smooth between integer lattice points.
pub fn smooth_noise(x: f32) -> f32 {
    let cell = x.floor();
    let f = x - cell;
    let t = f * f * (3.0 - 2.0 * f);
    let i = cell as i64;
    lerp(lattice(i), lattice(i.wrapping_add(1)), t)
}

fn lattice(i: i64) -> f32 {
    let mut h = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= h >> 32;
    h = h.wrapping_mul(0xD6E8_FEB8_6659_FD93);
    h ^= h >> 32;
    (h & 0xFFFF) as f32 / 65_535.0
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn finite(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

fn unit(x: f32) -> f32 {
    finite(x).clamp(0.0, 1.0)
}
