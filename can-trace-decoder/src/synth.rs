//! Synthetic classic CAN frames
//!
//! Builds the bit layout of a standard data frame from a hex string, applies
//! transmitter-side bit stuffing and encodes the result as a raw capture, so a
//! known frame can be replayed through the decoder. The CRC field is left as
//! zeros.

use crate::destuff::STUFF_RUN_LENGTH;
use crate::formats::encode_record;
use crate::types::{DecoderError, Level, Result};

/// One named field and its bits, MSB first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameField {
    pub name: String,
    pub bits: Vec<Level>,
}

impl FrameField {
    fn new(name: impl Into<String>, bits: Vec<Level>) -> Self {
        Self {
            name: name.into(),
            bits,
        }
    }
}

/// Stuffed bit stream plus the indices of the inserted stuff bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuffedBits {
    pub bits: Vec<Level>,
    pub stuff_positions: Vec<usize>,
}

/// Field-level description of a standard data frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuilder {
    id: u16,
    data: Vec<u8>,
}

impl FrameBuilder {
    /// Build a data frame with an 11-bit identifier and up to 8 data bytes
    pub fn new(id: u16, data: &[u8]) -> Result<Self> {
        if id > 0x7FF {
            return Err(DecoderError::InvalidFrame(format!(
                "identifier 0x{:X} does not fit in 11 bits",
                id
            )));
        }
        if data.len() > 8 {
            return Err(DecoderError::InvalidFrame(format!(
                "classic CAN carries at most 8 data bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            id,
            data: data.to_vec(),
        })
    }

    /// Parse `IIIDD..`: three hex digits of identifier followed by data bytes
    ///
    /// `7FF1122` is identifier 0x7FF with data `11 22`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let s = hex.trim().to_ascii_lowercase();
        if s.len() < 3 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DecoderError::InvalidFrame(
                "expected a hex string of at least 3 digits (ID + DATA)".to_string(),
            ));
        }
        if s.len() % 2 == 0 {
            return Err(DecoderError::InvalidFrame(format!(
                "data part of '{}' is not a whole number of bytes",
                hex.trim()
            )));
        }

        let parse = |digits: &str| {
            u16::from_str_radix(digits, 16)
                .map_err(|e| DecoderError::InvalidFrame(format!("bad hex '{}': {}", digits, e)))
        };
        let id = parse(&s[..3])?;
        let data = (3..s.len())
            .step_by(2)
            .map(|i| parse(&s[i..i + 2]).map(|b| b as u8))
            .collect::<Result<Vec<u8>>>()?;

        Self::new(id, &data)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Named fields from SOF to EOF, before stuffing
    pub fn fields(&self) -> Vec<FrameField> {
        let mut fields = vec![
            FrameField::new("SOF", vec![Level::Low]),
            FrameField::new("ID", to_bits(u32::from(self.id), 11)),
            FrameField::new("RTR", vec![Level::Low]),
            FrameField::new("IDE", vec![Level::Low]),
            FrameField::new("r0", vec![Level::Low]),
            FrameField::new("DLC", to_bits(self.data.len() as u32, 4)),
        ];
        for (i, &byte) in self.data.iter().enumerate() {
            fields.push(FrameField::new(format!("DATA{}", i), to_bits(u32::from(byte), 8)));
        }
        fields.extend([
            FrameField::new("CRC", vec![Level::Low; 15]),
            FrameField::new("DEL", vec![Level::High]),
            FrameField::new("ACK", vec![Level::Low]),
            FrameField::new("DEL", vec![Level::High]),
            FrameField::new("EOF", vec![Level::High; 7]),
        ]);
        fields
    }

    /// Logical (unstuffed) bits of the whole frame
    pub fn logical_bits(&self) -> Vec<Level> {
        self.fields().into_iter().flat_map(|f| f.bits).collect()
    }

    /// Frame bits as transmitted, stuffed from SOF through the CRC
    pub fn transmitted(&self) -> StuffedBits {
        let fields = self.fields();
        let stuffed_len: usize = fields
            .iter()
            .take_while(|f| f.name != "DEL")
            .map(|f| f.bits.len())
            .sum();
        let bits: Vec<Level> = fields.into_iter().flat_map(|f| f.bits).collect();
        stuff(&bits, stuffed_len)
    }
}

/// Insert a complementary bit after every five equal bits among the first `until` bits
///
/// A stuff bit may directly follow bit `until - 1`. Inserted bits take part in
/// the following run, as on the wire.
pub fn stuff(bits: &[Level], until: usize) -> StuffedBits {
    let mut out = Vec::with_capacity(bits.len() + bits.len() / 4);
    let mut stuff_positions = Vec::new();
    let mut run_value: Option<Level> = None;
    let mut run_length = 0;

    for (i, &bit) in bits.iter().enumerate() {
        if i <= until && run_length == STUFF_RUN_LENGTH {
            if let Some(value) = run_value {
                let inserted = value.complement();
                stuff_positions.push(out.len());
                out.push(inserted);
                run_value = Some(inserted);
                run_length = 1;
            }
        }

        if run_value == Some(bit) {
            run_length += 1;
        } else {
            run_value = Some(bit);
            run_length = 1;
        }
        out.push(bit);
    }

    StuffedBits {
        bits: out,
        stuff_positions,
    }
}

/// Encode a bit stream as raw capture records
///
/// One record is written at tick 0 and at every level change, with edge ticks
/// rounded to the device counter. A closing record of the opposite level after
/// the last bit completes the final bit period.
pub fn encode_capture(bits: &[Level], bit_duration: f64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let Some(&first) = bits.first() else {
        return bytes;
    };

    bytes.extend(encode_record(first, 0));
    let mut current = first;
    for (i, &bit) in bits.iter().enumerate().skip(1) {
        if bit != current {
            let tick = (i as f64 * bit_duration).round() as u32;
            bytes.extend(encode_record(bit, tick));
            current = bit;
        }
    }
    let end = (bits.len() as f64 * bit_duration).ceil() as u32;
    bytes.extend(encode_record(current.complement(), end));
    bytes
}

fn to_bits(value: u32, width: usize) -> Vec<Level> {
    (0..width)
        .rev()
        .map(|i| Level::from_bit(((value >> i) & 1) as u8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use Level::{High, Low};

    #[test]
    fn test_from_hex() {
        let frame = FrameBuilder::from_hex("7FF1122334455667788").unwrap();
        assert_eq!(frame.id(), 0x7FF);
        assert_eq!(frame.data(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

        let empty = FrameBuilder::from_hex("123").unwrap();
        assert!(empty.data().is_empty());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(FrameBuilder::from_hex("12").is_err());
        assert!(FrameBuilder::from_hex("12G4").is_err());
        assert!(FrameBuilder::from_hex("1234").is_err());
        assert!(FrameBuilder::from_hex("800").is_err());
        assert!(FrameBuilder::from_hex("123001122334455667788").is_err());
    }

    #[test]
    fn test_field_layout_matches_table() {
        let frame = FrameBuilder::from_hex("1230102030405060708").unwrap();
        let fields = frame.fields();
        let mut offset = 0;
        let mut starts = Vec::new();
        for field in &fields {
            starts.push((offset, field.name.as_str()));
            offset += field.bits.len();
        }
        assert_eq!(starts[6], (19, "DATA0"));
        assert_eq!(starts[14], (83, "CRC"));
        assert_eq!(starts[16], (99, "ACK"));
        assert_eq!(frame.logical_bits().len(), 108);
    }

    #[test]
    fn test_stuffing_inserts_complement() {
        let bits = [Low, Low, Low, Low, Low, High, High, High, High, Low];
        let stuffed = stuff(&bits, bits.len());

        // The stuffed High plus four data Highs make another run of five
        assert_eq!(stuffed.stuff_positions, vec![5, 10]);
        assert_eq!(stuffed.bits[5], High);
        assert_eq!(stuffed.bits[10], Low);
        assert_eq!(stuffed.bits.len(), 12);

        let unstuffed = stuff(&bits, 3);
        assert!(unstuffed.stuff_positions.is_empty());
    }

    #[test]
    fn test_stuff_bit_may_follow_last_stuffed_bit() {
        let bits = [High, High, High, High, High, High];
        assert_eq!(stuff(&bits, 5).stuff_positions, vec![5]);
        assert!(stuff(&bits, 4).stuff_positions.is_empty());
    }

    #[test]
    fn test_encode_capture_records() {
        let bytes = encode_capture(&[Low, Low, High], 20.0);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..8], &encode_record(Low, 0));
        assert_eq!(&bytes[8..16], &encode_record(High, 40));
        assert_eq!(&bytes[16..], &encode_record(Low, 60));

        assert!(encode_capture(&[], 20.0).is_empty());

        let drifting = encode_capture(&[Low, High], 20.1);
        assert_eq!(&drifting[8..16], &encode_record(High, 20));
        assert_eq!(&drifting[16..], &encode_record(Low, 41));
    }
}
