//! Core types for the CAN trace decoder library
//!
//! This module defines the values that flow between the three decoding stages:
//! raw capture bytes become [`TransitionEvent`]s, transitions become [`Level`] bits,
//! and bits become [`LabeledBit`]s annotated with stuffing and field information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Sampled logic state of the bus
///
/// On a CAN bus `Low` (0) is the dominant level and `High` (1) is recessive.
/// Serialized as the plain integers `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl Level {
    /// The opposite logic level
    pub fn complement(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    /// Index into per-level arrays such as occupancy counters
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level for a raw record byte; any non-zero value reads as `High`
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Level::Low
        } else {
            Level::High
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for Level {
    type Error = DecoderError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Level::Low),
            1 => Ok(Level::High),
            other => Err(DecoderError::InvalidData(format!(
                "logic level must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A level change observed by the capture device
///
/// The line switched to `level` at absolute device tick `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Level the line changed to
    pub level: Level,
    /// Free-running device counter value (wraps are not handled)
    pub tick: u32,
}

impl TransitionEvent {
    pub fn new(level: Level, tick: u32) -> Self {
        Self { level, tick }
    }
}

/// One decoded bit annotated by the frame destuffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledBit {
    /// Decoded bit value
    pub bit: Level,
    /// Position in the de-stuffed frame (stuff bits share the index of the next real bit)
    pub logical_index: usize,
    /// True if this bit was inserted by the transmitter's bit stuffing
    pub is_stuff_bit: bool,
    /// Field name when this bit starts a protocol field
    pub field_label: Option<&'static str>,
}

/// Errors that can occur while loading captures or synthesizing frames
///
/// The streaming decode path itself never fails: malformed bytes are skipped
/// and non-monotonic ticks resynchronize the session.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse capture: {0}")]
    CaptureParseError(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid timing configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
