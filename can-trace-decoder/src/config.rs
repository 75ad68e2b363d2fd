//! Decoder configuration types
//!
//! The timing parameters here are empirical values tuned against one capture
//! setup. They are exposed so a different capture device can be recalibrated
//! without touching the recovery algorithm.

use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};

/// Read size of the capture tool (15 records per read)
pub const DEFAULT_CHUNK_SIZE: usize = 120;

/// Corrected bit periods further than this from nominal cannot stay in sync
const MIN_DRIFT_RATIO: f64 = 0.9;
const MAX_DRIFT_RATIO: f64 = 1.1;

/// Timing recovery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Nominal ticks per bit period
    #[serde(default = "default_nominal_bit_duration")]
    pub nominal_bit_duration: f64,

    /// Once the bit index exceeds this value the corrected duration is used
    #[serde(default = "default_drift_threshold_index")]
    pub drift_threshold_index: usize,

    /// Ratio of the corrected to the nominal bit duration after the drift threshold
    #[serde(default = "default_drift_ratio")]
    pub drift_ratio: f64,

    /// Fraction of a nominal period whose occupancy counts as an exact tie
    #[serde(default = "default_tie_fraction")]
    pub tie_fraction: f64,

    /// Number of equal trailing bits that makes a tie resolve towards the opposite level
    #[serde(default = "default_tie_break_run")]
    pub tie_break_run: usize,
}

fn default_nominal_bit_duration() -> f64 {
    20.0
}

fn default_drift_threshold_index() -> usize {
    40
}

/// 20.1 ticks per bit on the calibrated 20-tick setup
fn default_drift_ratio() -> f64 {
    1.005
}

fn default_tie_fraction() -> f64 {
    0.5
}

fn default_tie_break_run() -> usize {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            nominal_bit_duration: default_nominal_bit_duration(),
            drift_threshold_index: default_drift_threshold_index(),
            drift_ratio: default_drift_ratio(),
            tie_fraction: default_tie_fraction(),
            tie_break_run: default_tie_break_run(),
        }
    }
}

impl TimingConfig {
    /// Create a timing configuration with the default calibration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the nominal bit duration
    ///
    /// The tie occupancy and the corrected duration are relative to the
    /// nominal duration and scale with it.
    pub fn with_bit_duration(mut self, ticks: f64) -> Self {
        self.nominal_bit_duration = ticks;
        self
    }

    /// Builder method: set the drift correction threshold and duration ratio
    pub fn with_drift_correction(mut self, after_index: usize, ratio: f64) -> Self {
        self.drift_threshold_index = after_index;
        self.drift_ratio = ratio;
        self
    }

    /// Builder method: disable drift correction entirely
    pub fn without_drift_correction(mut self) -> Self {
        self.drift_ratio = 1.0;
        self
    }

    /// Builder method: set the tie-break run length
    pub fn with_tie_break_run(mut self, run: usize) -> Self {
        self.tie_break_run = run;
        self
    }

    /// Occupancy in ticks that counts as an exact tie between the two levels
    pub fn tie_occupancy(&self) -> f64 {
        self.nominal_bit_duration * self.tie_fraction
    }

    /// Ticks per bit period after the drift threshold
    pub fn corrected_bit_duration(&self) -> f64 {
        self.nominal_bit_duration * self.drift_ratio
    }

    /// Bit duration to use once `bit_index` periods are complete
    pub fn bit_duration_for(&self, bit_index: usize) -> f64 {
        if bit_index > self.drift_threshold_index {
            self.corrected_bit_duration()
        } else {
            self.nominal_bit_duration
        }
    }

    /// Reject parameters the recovery loop cannot make progress with
    pub fn validate(&self) -> Result<()> {
        if !(self.nominal_bit_duration.is_finite() && self.nominal_bit_duration > 0.0) {
            return Err(DecoderError::InvalidConfig(format!(
                "nominal_bit_duration must be positive, got {}",
                self.nominal_bit_duration
            )));
        }
        if !(MIN_DRIFT_RATIO..=MAX_DRIFT_RATIO).contains(&self.drift_ratio) {
            return Err(DecoderError::InvalidConfig(format!(
                "drift_ratio must be within {}..={}, got {}",
                MIN_DRIFT_RATIO, MAX_DRIFT_RATIO, self.drift_ratio
            )));
        }
        if !(self.tie_fraction > 0.0 && self.tie_fraction < 1.0) {
            return Err(DecoderError::InvalidConfig(format!(
                "tie_fraction must lie strictly between 0 and 1, got {}",
                self.tie_fraction
            )));
        }
        if self.tie_break_run == 0 {
            return Err(DecoderError::InvalidConfig(
                "tie_break_run must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a streaming capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Timing recovery parameters
    #[serde(default)]
    pub timing: TimingConfig,

    /// Bytes handed to the decoder per feed when replaying a stored capture
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CaptureConfig {
    /// Create a capture configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the timing parameters
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Builder method: set the replay chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DecoderError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        self.timing.validate()
    }
}
