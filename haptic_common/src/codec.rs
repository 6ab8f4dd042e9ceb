//! Compact binary frames for transports that speak bytes.
//!
//! # Layout
//!
//! All multi-byte integers are little-endian.
//!
//! | Message | Bytes |
//! |---------|-------|
//! | play, dense (1) | `type:u8 key:u16 duration:u16 position:u8 n:u8 motors:[u8; n] mirror:u8` |
//! | play, sparse (2) | `type:u8 key:u16 duration:u16 position:u8 n:u8 (index:u8 value:u8)*n mirror:u8` |
//! | stop (3) | `type:u8 key:u16` |
//!
//! A stop with key hash 0 stops every pattern.

use crate::consts::MAX_MOTORS;
use crate::position::PhysicalPosition;
use crate::transport::{MotorArray, PlayCommand};
use thiserror::Error;

const MSG_PLAY_DENSE: u8 = 1;
const MSG_PLAY_SPARSE: u8 = 2;
const MSG_STOP: u8 = 3;

const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Key hash meaning "all patterns".
pub const ALL_PATTERNS: u16 = 0;

/// Stable 16-bit hash of a pattern key.
///
/// FNV-1a over the UTF-8 bytes, folded with `(h >> 16) ^ (h & 0xFFFF)`.
/// The empty key hashes to [`ALL_PATTERNS`]; a non-empty key that folds to 0
/// is moved to 1 so it never aliases the wildcard.
pub fn key_hash(key: &str) -> u16 {
    if key.is_empty() {
        return ALL_PATTERNS;
    }
    let hash = key.bytes().fold(FNV_OFFSET_BASIS, |h, b| {
        (h ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    });
    match ((hash >> 16) ^ (hash & 0xFFFF)) as u16 {
        ALL_PATTERNS => 1,
        folded => folded,
    }
}

/// Errors produced while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input ended before the frame was complete.
    #[error("frame truncated")]
    Truncated,

    /// First byte is not a known message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// Position byte does not name a device.
    #[error("unknown position id {0}")]
    UnknownPosition(u8),

    /// Motor count exceeds the largest device.
    #[error("too many motors: {0}")]
    TooManyMotors(usize),
}

/// Motor payload of a play frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Motors {
    /// One byte per motor slot.
    Dense(MotorArray),
    /// Only the non-zero slots.
    Sparse(heapless::Vec<(u8, u8), MAX_MOTORS>),
}

impl Motors {
    /// Expand to a dense array of `len` slots; out-of-range sparse indices are dropped.
    pub fn to_dense(&self, len: usize) -> MotorArray {
        let mut dense = MotorArray::new();
        match self {
            Motors::Dense(motors) => {
                for &m in motors.iter().take(len) {
                    let _ = dense.push(m);
                }
            }
            Motors::Sparse(points) => {
                for _ in 0..len.min(MAX_MOTORS) {
                    let _ = dense.push(0);
                }
                for &(index, value) in points {
                    if let Some(slot) = dense.get_mut(index as usize) {
                        *slot = value;
                    }
                }
            }
        }
        dense
    }
}

/// One wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Play a motor frame.
    Play {
        /// Hash of the pattern key.
        key_hash: u16,
        /// Play duration [ms].
        duration_ms: u16,
        /// Addressed device.
        position: PhysicalPosition,
        /// Motor payload.
        motors: Motors,
        /// Mirror left/right on the device.
        mirror: bool,
    },
    /// Stop one pattern, or all when `key_hash` is [`ALL_PATTERNS`].
    Stop {
        /// Hash of the pattern key.
        key_hash: u16,
    },
}

impl Frame {
    /// Build a play frame, preferring the sparse form when most motors are zero.
    pub fn play(command: &PlayCommand) -> Self {
        let active = command.motors.iter().filter(|&&m| m != 0).count();
        let motors = if active * 2 < command.motors.len() {
            let mut sparse = heapless::Vec::new();
            for (index, &value) in command.motors.iter().enumerate() {
                if value != 0 {
                    let _ = sparse.push((index as u8, value));
                }
            }
            Motors::Sparse(sparse)
        } else {
            Motors::Dense(command.motors.clone())
        };
        Frame::Play {
            key_hash: key_hash(&command.key),
            duration_ms: command.duration_ms,
            position: command.position,
            motors,
            mirror: false,
        }
    }

    /// Stop frame for `key`; `None` or `""` stops everything.
    pub fn stop(key: Option<&str>) -> Self {
        Frame::Stop {
            key_hash: key.map(key_hash).unwrap_or(ALL_PATTERNS),
        }
    }

    /// Serialize to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Play {
                key_hash,
                duration_ms,
                position,
                motors,
                mirror,
            } => {
                let mut out = Vec::with_capacity(8 + 2 * MAX_MOTORS);
                let msg_type = match motors {
                    Motors::Dense(_) => MSG_PLAY_DENSE,
                    Motors::Sparse(_) => MSG_PLAY_SPARSE,
                };
                out.push(msg_type);
                out.extend_from_slice(&key_hash.to_le_bytes());
                out.extend_from_slice(&duration_ms.to_le_bytes());
                out.push(position.id());
                match motors {
                    Motors::Dense(values) => {
                        out.push(values.len() as u8);
                        out.extend_from_slice(values);
                    }
                    Motors::Sparse(points) => {
                        out.push(points.len() as u8);
                        for &(index, value) in points {
                            out.push(index);
                            out.push(value);
                        }
                    }
                }
                out.push(u8::from(*mirror));
                out
            }
            Frame::Stop { key_hash } => {
                let mut out = Vec::with_capacity(3);
                out.push(MSG_STOP);
                out.extend_from_slice(&key_hash.to_le_bytes());
                out
            }
        }
    }

    /// Parse one frame from `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        match cursor.u8()? {
            MSG_STOP => Ok(Frame::Stop {
                key_hash: cursor.u16()?,
            }),
            msg_type @ (MSG_PLAY_DENSE | MSG_PLAY_SPARSE) => {
                let key_hash = cursor.u16()?;
                let duration_ms = cursor.u16()?;
                let position_id = cursor.u8()?;
                let position = PhysicalPosition::from_id(position_id)
                    .ok_or(CodecError::UnknownPosition(position_id))?;
                let count = cursor.u8()? as usize;
                if count > MAX_MOTORS {
                    return Err(CodecError::TooManyMotors(count));
                }
                let motors = if msg_type == MSG_PLAY_DENSE {
                    let mut values = MotorArray::new();
                    for _ in 0..count {
                        let _ = values.push(cursor.u8()?);
                    }
                    Motors::Dense(values)
                } else {
                    let mut points = heapless::Vec::new();
                    for _ in 0..count {
                        let index = cursor.u8()?;
                        let value = cursor.u8()?;
                        let _ = points.push((index, value));
                    }
                    Motors::Sparse(points)
                };
                let mirror = cursor.u8()? != 0;
                Ok(Frame::Play {
                    key_hash,
                    duration_ms,
                    position,
                    motors,
                    mirror,
                })
            }
            other => Err(CodecError::UnknownMessageType(other)),
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> Result<u8, CodecError> {
        let b = *self.bytes.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}
