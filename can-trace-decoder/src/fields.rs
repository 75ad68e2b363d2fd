//! Classic CAN data frame layout
//!
//! Field offsets are positions in the de-stuffed bit stream of a standard
//! (11-bit identifier) data frame carrying 8 data bytes.

use crate::types::{LabeledBit, Level};
use serde::Serialize;

/// Field start offsets and names, ordered by offset
pub const CLASSIC_FRAME_FIELDS: [(usize, &str); 19] = [
    (0, "SOF"),
    (1, "ID"),
    (12, "RTR"),
    (13, "IDE"),
    (14, "r0"),
    (15, "DLC"),
    (19, "DATA0"),
    (27, "DATA1"),
    (35, "DATA2"),
    (43, "DATA3"),
    (51, "DATA4"),
    (59, "DATA5"),
    (67, "DATA6"),
    (75, "DATA7"),
    (83, "CRC"),
    (98, "DEL"),
    (99, "ACK"),
    (100, "DEL"),
    (107, "EOF"),
];

const ID_BITS: std::ops::Range<usize> = 1..12;
const DLC_BITS: std::ops::Range<usize> = 15..19;
const DATA_START: usize = 19;
const CRC_BITS: std::ops::Range<usize> = 83..98;

/// Read-only map from logical bit offset to field name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable {
    entries: &'static [(usize, &'static str)],
}

impl FieldTable {
    /// The classic 11-bit identifier, 8 data byte layout
    pub const fn classic() -> Self {
        Self {
            entries: &CLASSIC_FRAME_FIELDS,
        }
    }

    /// Name of the field starting at `offset`, if any
    pub fn label_at(&self, offset: usize) -> Option<&'static str> {
        self.entries
            .binary_search_by_key(&offset, |&(start, _)| start)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Width in bits of the field starting at `offset`
    ///
    /// Measured to the next field start; the last field is one bit wide.
    /// Returns `None` when no field starts at `offset`.
    pub fn span(&self, offset: usize) -> Option<usize> {
        let i = self
            .entries
            .binary_search_by_key(&offset, |&(start, _)| start)
            .ok()?;
        let next = self.entries.get(i + 1).map_or(offset + 1, |&(start, _)| start);
        Some(next - offset)
    }

    /// All `(offset, name)` entries in offset order
    pub fn entries(&self) -> &'static [(usize, &'static str)] {
        self.entries
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::classic()
    }
}

/// Field values read out of a (possibly incomplete) de-stuffed frame
///
/// A field is only present once all of its bits have been decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameFields {
    pub id: Option<u16>,
    pub dlc: Option<u8>,
    pub data: Vec<u8>,
    pub crc: Option<u16>,
}

impl FrameFields {
    /// Extract field values from labeled bits, ignoring stuff bits
    pub fn extract(labeled: &[LabeledBit]) -> Self {
        let logical: Vec<Level> = labeled
            .iter()
            .filter(|b| !b.is_stuff_bit)
            .map(|b| b.bit)
            .collect();
        Self::from_logical_bits(&logical)
    }

    /// Extract field values from an already de-stuffed bit stream
    pub fn from_logical_bits(bits: &[Level]) -> Self {
        let id = read_field(bits, ID_BITS).map(|v| v as u16);
        let dlc = read_field(bits, DLC_BITS).map(|v| v as u8);

        let mut data = Vec::new();
        // Reserved DLC values above 8 still carry 8 bytes
        for i in 0..usize::from(dlc.unwrap_or(0).min(8)) {
            let start = DATA_START + i * 8;
            match read_field(bits, start..start + 8) {
                Some(byte) => data.push(byte as u8),
                None => break,
            }
        }

        let crc = read_field(bits, CRC_BITS).map(|v| v as u16);

        Self { id, dlc, data, crc }
    }

    /// Hex rendering of every complete field, in frame order
    pub fn hex_values(&self) -> Vec<(String, String)> {
        let mut values = Vec::new();
        if let Some(id) = self.id {
            values.push(("ID".to_string(), format!("0x{:03X}", id)));
        }
        if let Some(dlc) = self.dlc {
            values.push(("DLC".to_string(), format!("0x{:X}", dlc)));
        }
        for (i, byte) in self.data.iter().enumerate() {
            values.push((format!("DATA{}", i), format!("0x{:02X}", byte)));
        }
        if let Some(crc) = self.crc {
            values.push(("CRC".to_string(), format!("0x{:04X}", crc)));
        }
        values
    }
}

/// MSB-first value of `bits[range]`, or `None` if the range is not fully decoded
fn read_field(bits: &[Level], range: std::ops::Range<usize>) -> Option<u32> {
    let slice = bits.get(range)?;
    Some(slice.iter().fold(0u32, |acc, &b| (acc << 1) | u32::from(u8::from(b))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_of(value: u32, width: usize) -> Vec<Level> {
        (0..width)
            .rev()
            .map(|i| Level::from_bit(((value >> i) & 1) as u8))
            .collect()
    }

    #[test]
    fn test_label_lookup() {
        let table = FieldTable::classic();
        assert_eq!(table.label_at(0), Some("SOF"));
        assert_eq!(table.label_at(19), Some("DATA0"));
        assert_eq!(table.label_at(100), Some("DEL"));
        assert_eq!(table.label_at(107), Some("EOF"));
        assert_eq!(table.label_at(2), None);
        assert_eq!(table.label_at(200), None);
    }

    #[test]
    fn test_field_spans() {
        let table = FieldTable::classic();
        assert_eq!(table.span(1), Some(11));
        assert_eq!(table.span(15), Some(4));
        assert_eq!(table.span(27), Some(8));
        assert_eq!(table.span(83), Some(15));
        assert_eq!(table.span(107), Some(1));
        assert_eq!(table.span(5), None);
    }

    #[test]
    fn test_extract_complete_frame() {
        let mut bits = vec![Level::Low];
        bits.extend(bits_of(0x123, 11));
        bits.extend(bits_of(0, 3));
        bits.extend(bits_of(2, 4));
        bits.extend(bits_of(0xAB, 8));
        bits.extend(bits_of(0xCD, 8));

        let fields = FrameFields::from_logical_bits(&bits);
        assert_eq!(fields.id, Some(0x123));
        assert_eq!(fields.dlc, Some(2));
        assert_eq!(fields.data, vec![0xAB, 0xCD]);
        assert_eq!(fields.crc, None);

        let hex = fields.hex_values();
        assert_eq!(hex[0], ("ID".to_string(), "0x123".to_string()));
        assert_eq!(hex[2], ("DATA0".to_string(), "0xAB".to_string()));
    }

    #[test]
    fn test_extract_partial_frame() {
        let mut bits = vec![Level::Low];
        bits.extend(bits_of(0x7FF, 11));
        bits.extend(bits_of(0, 3));
        bits.extend(bits_of(8, 4));
        bits.extend(bits_of(0x11, 8));
        bits.extend(bits_of(0x2, 5)); // DATA1 incomplete

        let fields = FrameFields::from_logical_bits(&bits);
        assert_eq!(fields.id, Some(0x7FF));
        assert_eq!(fields.dlc, Some(8));
        assert_eq!(fields.data, vec![0x11]);

        let short = FrameFields::from_logical_bits(&bits[..10]);
        assert_eq!(short, FrameFields::default());
    }
}
