//! Main decoder API
//!
//! [`CaptureDecoder`] is the entry point for streaming use: it owns one
//! capture session (scanner, timing engine, destuffer) and accepts raw device
//! bytes in chunks of any size. After every chunk the decoded bits, their
//! labels and the transition history can be read back.

use crate::config::{CaptureConfig, TimingConfig};
use crate::destuff::IncrementalDestuffer;
use crate::fields::FrameFields;
use crate::formats::{self, TransitionDecoder};
use crate::timing::{ConsumeOutcome, TimingRecoveryEngine};
use crate::types::{LabeledBit, Level, Result, TransitionEvent};
use serde::Serialize;
use std::path::Path;

/// Counters describing what happened to the input of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Raw bytes fed so far
    pub bytes_fed: u64,
    /// Bytes skipped while searching for record markers
    pub bytes_skipped: u64,
    /// Records dropped for repeating the previous level
    pub duplicates_dropped: u64,
    /// Transitions accepted by the timing engine
    pub transitions: u64,
    /// Capture restarts detected
    pub resyncs: u64,
}

/// One streaming capture session
pub struct CaptureDecoder {
    scanner: TransitionDecoder,
    engine: TimingRecoveryEngine,
    destuffer: IncrementalDestuffer,
    /// Bytes of an incomplete record waiting for the next chunk
    pending: Vec<u8>,
    /// Transitions of the current capture run
    transitions: Vec<TransitionEvent>,
    bytes_fed: u64,
    accepted: u64,
}

impl CaptureDecoder {
    /// Create a session with the default timing calibration
    pub fn new() -> Self {
        Self::with_engine(TimingRecoveryEngine::new())
    }

    /// Create a session with custom timing parameters
    pub fn with_timing(timing: TimingConfig) -> Result<Self> {
        Ok(Self::with_engine(TimingRecoveryEngine::with_config(timing)?))
    }

    fn with_engine(engine: TimingRecoveryEngine) -> Self {
        Self {
            scanner: TransitionDecoder::new(),
            engine,
            destuffer: IncrementalDestuffer::new(),
            pending: Vec::new(),
            transitions: Vec::new(),
            bytes_fed: 0,
            accepted: 0,
        }
    }

    /// Feed a chunk of raw device bytes
    ///
    /// Returns the number of bits decoded from this chunk. When the chunk
    /// contained a capture restart, only bits of the new capture are counted.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        self.bytes_fed += chunk.len() as u64;
        self.pending.extend_from_slice(chunk);

        let scan = self.scanner.scan(&self.pending);
        self.pending.drain(..scan.consumed);

        let mut decoded = 0;
        for event in scan.events {
            match self.engine.consume(event) {
                ConsumeOutcome::Applied { appended } => {
                    decoded += appended;
                    self.transitions.push(event);
                    self.accepted += 1;
                }
                ConsumeOutcome::Resynchronized { appended } => {
                    log::info!("Capture restart detected at tick {}", event.tick);
                    decoded = appended;
                    self.destuffer.reset();
                    self.transitions.clear();
                    self.transitions.push(event);
                    self.accepted += 1;
                }
                ConsumeOutcome::Ignored => {}
            }
        }

        self.destuffer.update(self.engine.bits());
        log::trace!(
            "Fed {} bytes: {} new bits, {} pending bytes",
            chunk.len(),
            decoded,
            self.pending.len()
        );
        decoded
    }

    /// Replay a stored capture file in `config.chunk_size` chunks
    pub fn decode_file(path: &Path, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;
        let bytes = formats::load_capture(path)?;

        let mut decoder = Self::with_timing(config.timing.clone())?;
        for chunk in bytes.chunks(config.chunk_size) {
            decoder.feed(chunk);
        }

        log::info!(
            "Decoded {} bits from {:?} ({} transitions)",
            decoder.bits().len(),
            path,
            decoder.transitions().len()
        );
        Ok(decoder)
    }

    /// Decoded bits of the current capture run
    pub fn bits(&self) -> &[Level] {
        self.engine.bits()
    }

    /// Bits of the current capture run with stuffing and field labels
    pub fn labeled(&self) -> &[LabeledBit] {
        self.destuffer.labeled()
    }

    /// Field values decoded so far
    pub fn fields(&self) -> FrameFields {
        FrameFields::extract(self.labeled())
    }

    /// Accepted transitions of the current capture run
    pub fn transitions(&self) -> &[TransitionEvent] {
        &self.transitions
    }

    /// Transition history as a step trace for plotting
    ///
    /// Every transition contributes the previous level and the new level at
    /// its tick, so consecutive points draw vertical edges.
    pub fn step_points(&self) -> Vec<(u32, Level)> {
        let mut points = Vec::with_capacity(self.transitions.len() * 2);
        for event in &self.transitions {
            if let Some(&(_, previous)) = points.last() {
                points.push((event.tick, previous));
            }
            points.push((event.tick, event.level));
        }
        points
    }

    /// Bytes held back until the rest of their record arrives
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn engine(&self) -> &TimingRecoveryEngine {
        &self.engine
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            bytes_fed: self.bytes_fed,
            bytes_skipped: self.scanner.bytes_skipped(),
            duplicates_dropped: self.scanner.duplicates_dropped(),
            transitions: self.accepted,
            resyncs: self.engine.resync_count(),
        }
    }

    /// Drop all decoded state and pending bytes, keeping the configuration
    pub fn reset(&mut self) {
        let engine = TimingRecoveryEngine::from_valid_config(self.engine.config().clone());
        *self = Self::with_engine(engine);
    }
}

impl Default for CaptureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::encode_record;
    use Level::{High, Low};

    fn capture(items: &[(Level, u32)]) -> Vec<u8> {
        items
            .iter()
            .flat_map(|&(level, tick)| encode_record(level, tick))
            .collect()
    }

    #[test]
    fn test_decoder_creation() {
        let decoder = CaptureDecoder::new();
        assert!(decoder.bits().is_empty());
        assert!(decoder.labeled().is_empty());
        assert_eq!(decoder.stats(), SessionStats::default());
    }

    #[test]
    fn test_two_record_scenario() {
        let mut decoder = CaptureDecoder::new();
        let bytes = capture(&[(Low, 0), (High, 20)]);

        assert_eq!(decoder.feed(&bytes), 1);
        assert_eq!(decoder.transitions().len(), 2);
        assert_eq!(decoder.bits(), &[Low]);
        assert_eq!(decoder.labeled()[0].field_label, Some("SOF"));
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let items: Vec<(Level, u32)> = (0..40u32)
            .map(|i| (if i % 2 == 0 { Low } else { High }, i * 30 + (i % 3) * 7))
            .collect();
        let bytes = capture(&items);

        let mut whole = CaptureDecoder::new();
        whole.feed(&bytes);

        for chunk_size in [1, 3, 7, 8, 13, 120] {
            let mut chunked = CaptureDecoder::new();
            for chunk in bytes.chunks(chunk_size) {
                chunked.feed(chunk);
            }
            assert_eq!(chunked.bits(), whole.bits(), "chunk size {}", chunk_size);
            assert_eq!(chunked.labeled(), whole.labeled());
            assert_eq!(chunked.pending_bytes(), 0);
        }
    }

    #[test]
    fn test_restart_clears_session() {
        let mut decoder = CaptureDecoder::new();
        decoder.feed(&capture(&[(Low, 0), (High, 120), (Low, 200)]));
        assert_eq!(decoder.bits().len(), 10);
        assert!(decoder.labeled().iter().any(|b| b.is_stuff_bit));

        decoder.feed(&capture(&[(High, 0)]));
        assert!(decoder.bits().is_empty());
        assert!(decoder.labeled().is_empty());
        assert_eq!(decoder.transitions(), &[TransitionEvent::new(High, 0)]);
        assert_eq!(decoder.stats().resyncs, 1);

        assert_eq!(decoder.feed(&capture(&[(Low, 40)])), 2);
        assert_eq!(decoder.labeled().len(), 2);
    }

    #[test]
    fn test_step_points() {
        let mut decoder = CaptureDecoder::new();
        decoder.feed(&capture(&[(Low, 0), (High, 20), (Low, 60)]));
        assert_eq!(
            decoder.step_points(),
            vec![(0, Low), (20, Low), (20, High), (60, High), (60, Low)]
        );
    }

    #[test]
    fn test_reset_keeps_timing() {
        let timing = TimingConfig::new().with_bit_duration(10.0);
        let mut decoder = CaptureDecoder::with_timing(timing).unwrap();
        decoder.feed(&capture(&[(Low, 0), (High, 30)]));
        assert_eq!(decoder.bits().len(), 3);

        decoder.feed(&encode_record(Low, 50)[..4]);
        decoder.reset();
        assert_eq!(decoder.pending_bytes(), 0);
        assert!(decoder.bits().is_empty());
        assert_eq!(decoder.engine().config().nominal_bit_duration, 10.0);
    }

    #[test]
    fn test_with_timing_rejects_stalling_config() {
        let zero = TimingConfig::new().with_bit_duration(0.0);
        assert!(CaptureDecoder::with_timing(zero).is_err());

        let mut negative = TimingConfig::new();
        negative.nominal_bit_duration = -20.0;
        assert!(CaptureDecoder::with_timing(negative).is_err());
    }

    #[test]
    fn test_stats() {
        let mut decoder = CaptureDecoder::new();
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(capture(&[(Low, 0), (Low, 5), (High, 20)]));
        decoder.feed(&bytes);

        let stats = decoder.stats();
        assert_eq!(stats.bytes_fed, 26);
        assert_eq!(stats.bytes_skipped, 2);
        assert_eq!(stats.duplicates_dropped, 1);
        assert_eq!(stats.transitions, 2);
    }
}
