//! Capture formats
//!
//! This module contains the raw record scanner and the loaders for stored
//! captures. A stored capture is either the raw byte stream as read from the
//! device, or a text dump with one `b'...'` byte literal per line.

use crate::types::{DecoderError, Level, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;
use std::path::Path;

pub mod literal;
pub mod raw;

pub use raw::{ScanOutput, TransitionDecoder};

/// Size of one capture record in bytes
pub const RECORD_LEN: usize = 8;

/// Accepted record markers; the middle byte doubles as the level
pub const RECORD_MARKERS: [[u8; 3]; 2] = [[0x11, 0x00, 0x01], [0x11, 0x01, 0x01]];

/// Encode one capture record the way the device emits it
pub fn encode_record(level: Level, tick: u32) -> [u8; RECORD_LEN] {
    let mut record = [0x11, u8::from(level), 0x01, 0x00, 0, 0, 0, 0];
    LittleEndian::write_u32(&mut record[4..8], tick);
    record
}

/// Load a stored capture into raw device bytes
///
/// Text dumps of byte literals are detected by their leading `b'` / `b"`
/// and converted; anything else is taken as the raw byte stream.
pub fn load_capture(path: &Path) -> Result<Vec<u8>> {
    log::info!("Loading capture file: {:?}", path);

    if !path.exists() {
        return Err(DecoderError::CaptureParseError(format!(
            "Capture file not found: {:?}",
            path
        )));
    }

    let data = fs::read(path)?;

    if literal::is_literal_dump(&data) {
        log::debug!("Detected byte-literal text dump");
        let bytes = literal::parse_literal_dump(&data);
        log::info!("Decoded {} bytes from {} byte text dump", bytes.len(), data.len());
        Ok(bytes)
    } else {
        log::info!("Loaded {} raw capture bytes", data.len());
        Ok(data)
    }
}
