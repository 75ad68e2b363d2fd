//! Raw capture record scanner
//!
//! The capture device streams fixed 8-byte records, one per sampled level:
//!
//! | offset | meaning |
//! |--------|---------|
//! | 0..3   | marker `11 00 01` or `11 01 01` |
//! | 1      | level (0/1), shared with the marker |
//! | 3      | reserved |
//! | 4..8   | tick, u32 little-endian |
//!
//! The scanner resynchronizes one byte at a time on the marker, so line noise
//! or a read that starts mid-record only costs the bytes before the next marker.

use super::{RECORD_LEN, RECORD_MARKERS};
use crate::types::{Level, TransitionEvent};
use byteorder::{ByteOrder, LittleEndian};

/// Events extracted by one [`TransitionDecoder::scan`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// Level changes in stream order
    pub events: Vec<TransitionEvent>,
    /// Bytes fully processed; the rest must be re-presented with the next chunk
    pub consumed: usize,
}

/// Stateful scanner turning raw capture bytes into level transitions
///
/// Remembers the last emitted event so repeated records of an unchanged level
/// are dropped even when they arrive in a later chunk.
#[derive(Debug, Clone, Default)]
pub struct TransitionDecoder {
    last_emitted: Option<TransitionEvent>,
    duplicates_dropped: u64,
    bytes_skipped: u64,
}

impl TransitionDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `bytes` for records and return the transitions found
    ///
    /// A record whose marker matches but which is cut off by the end of the
    /// buffer stops the scan; so does a tail that could still grow into a
    /// marker. Those bytes are left unconsumed.
    pub fn scan(&mut self, bytes: &[u8]) -> ScanOutput {
        let mut output = ScanOutput::default();
        let mut cursor = 0;

        while cursor < bytes.len() {
            let rest = &bytes[cursor..];

            if rest.len() < RECORD_LEN && could_start_record(rest) {
                log::trace!("Holding back {} byte partial record", rest.len());
                break;
            }

            if !has_marker(rest) {
                self.bytes_skipped += 1;
                cursor += 1;
                continue;
            }

            let record = &rest[..RECORD_LEN];
            let event = TransitionEvent {
                level: Level::from_bit(record[1]),
                tick: LittleEndian::read_u32(&record[4..8]),
            };
            cursor += RECORD_LEN;

            if let Some(last) = self.last_emitted {
                // A new capture run may legitimately start at the level the old one ended on.
                if event.tick >= last.tick && event.level == last.level {
                    log::trace!("Dropping repeated level {} record at tick {}", event.level, event.tick);
                    self.duplicates_dropped += 1;
                    continue;
                }
            }

            self.last_emitted = Some(event);
            output.events.push(event);
        }

        output.consumed = cursor;
        output
    }

    /// Forget the last emitted level
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }

    /// Records discarded because they repeated the previous level
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped
    }

    /// Bytes skipped while searching for a record marker
    pub fn bytes_skipped(&self) -> u64 {
        self.bytes_skipped
    }
}

fn has_marker(bytes: &[u8]) -> bool {
    RECORD_MARKERS.iter().any(|marker| bytes.starts_with(marker))
}

/// True if `tail` is a prefix of some record, i.e. more bytes could complete it
fn could_start_record(tail: &[u8]) -> bool {
    RECORD_MARKERS.iter().any(|marker| {
        let n = tail.len().min(marker.len());
        tail[..n] == marker[..n]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::encode_record;

    fn records(items: &[(Level, u32)]) -> Vec<u8> {
        items
            .iter()
            .flat_map(|&(level, tick)| encode_record(level, tick))
            .collect()
    }

    #[test]
    fn test_scan_two_records() {
        let bytes = [
            0x11, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x11, 0x01, 0x01, 0x00, 0x14, 0x00, 0x00, 0x00,
        ];
        let mut decoder = TransitionDecoder::new();
        let output = decoder.scan(&bytes);

        assert_eq!(output.consumed, 16);
        assert_eq!(
            output.events,
            vec![
                TransitionEvent::new(Level::Low, 0),
                TransitionEvent::new(Level::High, 20),
            ]
        );
    }

    #[test]
    fn test_garbage_is_skipped() {
        let mut bytes = vec![0xAA, 0x11, 0x05, 0xFF];
        bytes.extend(records(&[(Level::High, 300)]));
        bytes.extend([0x00, 0x42, 0x13]);
        bytes.extend(records(&[(Level::Low, 320)]));

        let mut decoder = TransitionDecoder::new();
        let output = decoder.scan(&bytes);

        assert_eq!(output.consumed, bytes.len());
        assert_eq!(output.events.len(), 2);
        assert_eq!(output.events[1], TransitionEvent::new(Level::Low, 320));
        assert_eq!(decoder.bytes_skipped(), 7);
    }

    #[test]
    fn test_truncated_record_left_unconsumed() {
        let mut bytes = records(&[(Level::Low, 0)]);
        bytes.extend(&records(&[(Level::High, 40)])[..5]);

        let mut decoder = TransitionDecoder::new();
        let output = decoder.scan(&bytes);
        assert_eq!(output.events.len(), 1);
        assert_eq!(output.consumed, 8);

        // Caller re-presents the tail with the rest of the record
        let mut next = bytes[output.consumed..].to_vec();
        next.extend(&records(&[(Level::High, 40)])[5..]);
        let output = decoder.scan(&next);
        assert_eq!(output.events, vec![TransitionEvent::new(Level::High, 40)]);
        assert_eq!(output.consumed, 8);
    }

    #[test]
    fn test_split_marker_held_back() {
        let record = records(&[(Level::High, 60)]);
        let mut decoder = TransitionDecoder::new();

        let output = decoder.scan(&record[..2]);
        assert!(output.events.is_empty());
        assert_eq!(output.consumed, 0);

        // A tail that cannot become a marker is dropped
        let output = decoder.scan(&[0x11, 0x07]);
        assert_eq!(output.consumed, 2);
    }

    #[test]
    fn test_duplicate_levels_suppressed() {
        let bytes = records(&[
            (Level::Low, 0),
            (Level::Low, 10),
            (Level::High, 20),
            (Level::High, 25),
            (Level::Low, 40),
        ]);
        let mut decoder = TransitionDecoder::new();
        let output = decoder.scan(&bytes);

        let ticks: Vec<u32> = output.events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 20, 40]);
        assert_eq!(decoder.duplicates_dropped(), 2);
        assert_eq!(output.consumed, bytes.len());
    }

    #[test]
    fn test_duplicate_suppression_spans_chunks() {
        let mut decoder = TransitionDecoder::new();
        decoder.scan(&records(&[(Level::High, 100)]));
        let output = decoder.scan(&records(&[(Level::High, 120), (Level::Low, 140)]));
        assert_eq!(output.events, vec![TransitionEvent::new(Level::Low, 140)]);
    }

    #[test]
    fn test_restart_at_same_level_is_kept() {
        let mut decoder = TransitionDecoder::new();
        decoder.scan(&records(&[(Level::Low, 500)]));
        let output = decoder.scan(&records(&[(Level::Low, 0)]));
        assert_eq!(output.events, vec![TransitionEvent::new(Level::Low, 0)]);
    }
}
