//! CAN Trace Decoder Library
//!
//! Recovers the bit stream and frame structure of a CAN bus from a raw
//! logic-level capture: a stream of 8-byte records, each stating the bus level
//! and the device tick at which the line changed to it.
//!
//! # Architecture
//!
//! Decoding runs in three one-way stages:
//! - [`TransitionDecoder`] scans raw bytes for framed records and emits level transitions
//! - [`TimingRecoveryEngine`] spreads transitions over nominal bit periods and decodes one bit per period
//! - [`FrameDestuffer`] removes stuff bits and labels the start of each frame field
//!
//! [`CaptureDecoder`] ties the stages into one streaming session. All stages are
//! synchronous and never fail on malformed input: noise is skipped, truncated
//! records wait for more data and a backwards tick starts a fresh capture.
//!
//! The library does NOT:
//! - Read from serial ports or other devices
//! - Validate CRCs or check protocol conformance
//! - Decode extended (29-bit identifier) frames
//!
//! # Example Usage
//!
//! ```no_run
//! use can_trace_decoder::CaptureDecoder;
//!
//! let mut decoder = CaptureDecoder::new();
//!
//! // Feed raw bytes as they arrive from the capture device
//! let chunk: &[u8] = &[0x11, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
//! decoder.feed(chunk);
//!
//! for bit in decoder.labeled() {
//!     if let Some(label) = bit.field_label {
//!         println!("{} starts at logical bit {}", label, bit.logical_index);
//!     }
//! }
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod destuff;
pub mod fields;
pub mod formats;
pub mod synth;
pub mod timing;
pub mod types;

// Re-export main types for convenience
pub use config::{CaptureConfig, TimingConfig};
pub use decoder::{CaptureDecoder, SessionStats};
pub use destuff::{FrameDestuffer, IncrementalDestuffer};
pub use fields::{FieldTable, FrameFields};
pub use formats::{load_capture, ScanOutput, TransitionDecoder};
pub use synth::FrameBuilder;
pub use timing::{ConsumeOutcome, TimingRecoveryEngine, TimingState};
pub use types::{DecoderError, LabeledBit, Level, Result, TransitionEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
