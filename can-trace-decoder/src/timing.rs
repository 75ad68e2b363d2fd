//! Timing recovery
//!
//! Rebuilds one bit per nominal bit period from level transitions whose ticks
//! drift against the bit clock. Each transition closes the span since the
//! previous one; that span is spread over the bit periods it covers. A period
//! the line spent entirely at one level decodes to that level, a period cut by
//! a transition is decided by which level occupied it longer.
//!
//! A tick lower than the previous one means the device started a new capture:
//! the partial frame is discarded and decoding restarts from bit 0.

use crate::config::TimingConfig;
use crate::types::{Level, Result, TransitionEvent};

/// Mutable working state of one capture session
#[derive(Debug, Clone, PartialEq)]
pub struct TimingState {
    /// Tick of the last fully consumed transition
    pub last_tick: u32,
    /// Level of the last fully consumed transition
    pub last_level: Option<Level>,
    /// Ordinal of the bit period being accumulated
    pub bit_index: usize,
    /// Ticks per bit period currently in use
    pub bit_duration: f64,
    /// Ticks attributed to `Low` / `High` in the period in progress
    pub occupancy: [f64; 2],
    /// Decoded bits, oldest first
    pub bits: Vec<Level>,
}

impl TimingState {
    fn new(config: &TimingConfig) -> Self {
        Self {
            last_tick: 0,
            last_level: None,
            bit_index: 0,
            bit_duration: config.nominal_bit_duration,
            occupancy: [0.0, 0.0],
            bits: Vec::new(),
        }
    }

    fn period_start(&self) -> f64 {
        self.bit_index as f64 * self.bit_duration
    }

    fn period_end(&self) -> f64 {
        (self.bit_index + 1) as f64 * self.bit_duration
    }

    /// True if the last `run` bits exist and all equal `level`
    fn trailing_run_of(&self, level: Level, run: usize) -> bool {
        self.bits.len() >= run && self.bits[self.bits.len() - run..].iter().all(|&b| b == level)
    }
}

/// Outcome of feeding one transition to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The transition was applied and `appended` bits were finalized
    Applied { appended: usize },
    /// The tick went backwards; state was cleared before applying the transition
    Resynchronized { appended: usize },
    /// The transition repeated the current level and was ignored
    Ignored,
}

impl ConsumeOutcome {
    /// Number of bits finalized by this transition
    pub fn appended(&self) -> usize {
        match self {
            ConsumeOutcome::Applied { appended } | ConsumeOutcome::Resynchronized { appended } => {
                *appended
            }
            ConsumeOutcome::Ignored => 0,
        }
    }
}

/// Turns level transitions into a decoded bit sequence
#[derive(Debug, Clone)]
pub struct TimingRecoveryEngine {
    config: TimingConfig,
    state: TimingState,
    resyncs: u64,
}

impl TimingRecoveryEngine {
    /// Create an engine with the default calibration
    pub fn new() -> Self {
        Self::from_valid_config(TimingConfig::default())
    }

    /// Create an engine with custom timing parameters
    ///
    /// Fails with [`DecoderError::InvalidConfig`](crate::DecoderError::InvalidConfig)
    /// for parameters that would stall period spreading, such as a bit
    /// duration that is not positive.
    pub fn with_config(config: TimingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Build from a configuration that already passed validation
    pub(crate) fn from_valid_config(config: TimingConfig) -> Self {
        let state = TimingState::new(&config);
        Self {
            config,
            state,
            resyncs: 0,
        }
    }

    /// Apply one transition, appending every bit period it completes
    pub fn consume(&mut self, event: TransitionEvent) -> ConsumeOutcome {
        let mut resynchronized = false;

        if event.tick < self.state.last_tick {
            log::debug!(
                "Tick went backwards ({} -> {}), discarding {} bits and resynchronizing",
                self.state.last_tick,
                event.tick,
                self.state.bits.len()
            );
            self.reset();
            self.resyncs += 1;
            resynchronized = true;
        } else if self.state.last_level == Some(event.level) {
            log::warn!(
                "Ignoring repeated level {} at tick {}; transitions must alternate",
                event.level,
                event.tick
            );
            return ConsumeOutcome::Ignored;
        }

        let before = self.state.bits.len();
        self.spread_span(event);

        self.state.last_tick = event.tick;
        self.state.last_level = Some(event.level);

        let duration = self.config.bit_duration_for(self.state.bit_index);
        if duration != self.state.bit_duration {
            log::debug!(
                "Bit index {} past drift threshold, bit duration now {}",
                self.state.bit_index,
                duration
            );
            self.state.bit_duration = duration;
        }

        let appended = self.state.bits.len() - before;
        if resynchronized {
            ConsumeOutcome::Resynchronized { appended }
        } else {
            ConsumeOutcome::Applied { appended }
        }
    }

    /// Attribute the span `last_tick..event.tick` (held at the opposite level) to bit periods
    fn spread_span(&mut self, event: TransitionEvent) {
        let held = event.level.complement();
        let tick = f64::from(event.tick);

        while self.state.period_start() <= tick {
            let period_end = self.state.period_end();
            if period_end > tick {
                // Span ends inside this period; the next transition completes it
                self.state.occupancy[held.index()] = tick - self.state.period_start();
                break;
            }

            let bit = if self.state.occupancy == [0.0, 0.0] {
                held
            } else {
                self.state.occupancy[held.index()] = period_end - f64::from(self.state.last_tick);
                self.vote()
            };
            self.state.bits.push(bit);
            self.state.occupancy = [0.0, 0.0];
            self.state.bit_index += 1;
        }
    }

    /// Majority vote over a period that saw both levels
    fn vote(&self) -> Level {
        let [low, high] = self.state.occupancy;
        let tie = self.config.tie_occupancy();
        let run = self.config.tie_break_run;

        if low > tie {
            Level::Low
        } else if low == tie {
            // A long run of equal bits must be followed by a change
            if self.state.trailing_run_of(Level::Low, run) {
                Level::High
            } else {
                Level::Low
            }
        } else if high == tie {
            if self.state.trailing_run_of(Level::High, run) {
                Level::Low
            } else {
                Level::High
            }
        } else {
            Level::High
        }
    }

    /// Clear all state as if a new capture started
    pub fn reset(&mut self) {
        self.state = TimingState::new(&self.config);
    }

    /// Decoded bits so far
    pub fn bits(&self) -> &[Level] {
        &self.state.bits
    }

    pub fn state(&self) -> &TimingState {
        &self.state
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Number of resynchronizations since the engine was created
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }
}

impl Default for TimingRecoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}
