//! Report generation
//!
//! Renders one decoded capture as a TXT report (bit string, waveform,
//! labeled-bit table, field values, counters) or as JSON.

use anyhow::Result;
use can_trace_decoder::{CaptureDecoder, FieldTable, FrameFields, LabeledBit, Level, SessionStats};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Bits per waveform and bit-string row
const ROW_BITS: usize = 32;

/// Everything known about one decoded capture
#[derive(Debug, Serialize)]
pub struct CaptureReport<'a> {
    pub source: String,
    pub generated_at: String,
    pub decoder_version: &'static str,
    pub bit_count: usize,
    pub bits: String,
    pub stuff_positions: Vec<usize>,
    pub fields: FrameFields,
    pub labeled: &'a [LabeledBit],
    pub stats: SessionStats,
}

/// TXT rendering switches
#[derive(Debug, Clone, Copy)]
pub struct TxtOptions {
    pub waveform: bool,
    pub all_bits: bool,
}

impl<'a> CaptureReport<'a> {
    pub fn new(source: &Path, decoder: &'a CaptureDecoder) -> Self {
        let labeled = decoder.labeled();
        Self {
            source: source.display().to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            decoder_version: can_trace_decoder::VERSION,
            bit_count: decoder.bits().len(),
            bits: bit_string(decoder.bits()),
            stuff_positions: labeled
                .iter()
                .enumerate()
                .filter(|(_, b)| b.is_stuff_bit)
                .map(|(i, _)| i)
                .collect(),
            fields: decoder.fields(),
            labeled,
            stats: decoder.stats(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_txt(&self, options: TxtOptions) -> String {
        TxtReport {
            report: self,
            options,
        }
        .to_string()
    }
}

/// TXT rendering of a [`CaptureReport`]
struct TxtReport<'r, 'a> {
    report: &'r CaptureReport<'a>,
    options: TxtOptions,
}

impl fmt::Display for TxtReport<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let rule = "=".repeat(60);

        writeln!(f, "{}", rule)?;
        writeln!(f, "  CAN Trace Report: {}", report.source)?;
        writeln!(f, "  Generated: {}", report.generated_at)?;
        writeln!(f, "  Decoder:   v{}", report.decoder_version)?;
        writeln!(f, "{}\n", rule)?;

        writeln!(f, "Bits ({}):", report.bit_count)?;
        let chars: Vec<char> = report.bits.chars().collect();
        for (row, chunk) in chars.chunks(ROW_BITS).enumerate() {
            let text: String = chunk.iter().collect();
            writeln!(f, "  {:>4}  {}", row * ROW_BITS, text)?;
        }

        if self.options.waveform && !report.labeled.is_empty() {
            writeln!(f, "\nWaveform:")?;
            let levels: Vec<Level> = report.labeled.iter().map(|b| b.bit).collect();
            for (top, bottom) in waveform_rows(&levels) {
                writeln!(f, "  {}", top)?;
                writeln!(f, "  {}", bottom)?;
            }
        }

        writeln!(f, "\nLabeled bits:")?;
        writeln!(f, "  {:>5}  {:>7}  {:>3}  {:<5}  {}", "BIT", "LOGICAL", "LVL", "STUFF", "FIELD")?;
        let table = FieldTable::classic();
        for (i, bit) in report.labeled.iter().enumerate() {
            if !self.options.all_bits && !bit.is_stuff_bit && bit.field_label.is_none() {
                continue;
            }
            let field = match bit.field_label {
                Some(name) => {
                    let span = table.span(bit.logical_index).unwrap_or(1);
                    format!("{} ({} bit{})", name, span, if span == 1 { "" } else { "s" })
                }
                None => String::new(),
            };
            writeln!(
                f,
                "  {:>5}  {:>7}  {:>3}  {:<5}  {}",
                i,
                bit.logical_index,
                u8::from(bit.bit),
                if bit.is_stuff_bit { "yes" } else { "" },
                field
            )?;
        }

        writeln!(f, "\nField values:")?;
        let values = report.fields.hex_values();
        if values.is_empty() {
            writeln!(f, "  (no complete fields)")?;
        }
        for (name, value) in values {
            writeln!(f, "  {:<6} {}", name, value)?;
        }

        let stats = &report.stats;
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Bytes fed:          {}", stats.bytes_fed)?;
        writeln!(f, "  Bytes skipped:      {}", stats.bytes_skipped)?;
        writeln!(f, "  Duplicate records:  {}", stats.duplicates_dropped)?;
        writeln!(f, "  Transitions:        {}", stats.transitions)?;
        writeln!(f, "  Capture restarts:   {}", stats.resyncs)?;
        writeln!(f, "  Stuff bits:         {}", report.stuff_positions.len())
    }
}

fn bit_string(bits: &[Level]) -> String {
    bits.iter().map(|b| b.to_string()).collect()
}

/// Two-line ASCII waveform per row of bits, two columns per bit
///
/// High is drawn on the top line, Low on the bottom line, and every level
/// change adds a `|` edge.
pub fn waveform_rows(levels: &[Level]) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    let mut previous: Option<Level> = None;

    for chunk in levels.chunks(ROW_BITS) {
        let mut top = String::new();
        let mut bottom = String::new();
        for &level in chunk {
            if previous.is_some_and(|p| p != level) {
                top.push(' ');
                bottom.push('|');
            }
            match level {
                Level::High => {
                    top.push_str("__");
                    bottom.push_str("  ");
                }
                Level::Low => {
                    top.push_str("  ");
                    bottom.push_str("__");
                }
            }
            previous = Some(level);
        }
        rows.push((top.trim_end().to_string(), bottom.trim_end().to_string()));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_trace_decoder::synth::encode_capture;
    use can_trace_decoder::{FrameBuilder, TimingConfig};
    use std::path::PathBuf;
    use Level::{High, Low};

    fn decoded(hex: &str) -> CaptureDecoder {
        let frame = FrameBuilder::from_hex(hex).unwrap().transmitted();
        let timing = TimingConfig::new().without_drift_correction();
        let mut decoder = CaptureDecoder::with_timing(timing).unwrap();
        decoder.feed(&encode_capture(&frame.bits, 20.0));
        assert_eq!(decoder.bits(), frame.bits.as_slice());
        decoder
    }

    #[test]
    fn test_waveform_rows() {
        let rows = waveform_rows(&[Low, High, High, Low]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "   ____");
        assert_eq!(rows[0].1, "__|    |__");
    }

    #[test]
    fn test_waveform_wraps_rows() {
        let levels = vec![Low; ROW_BITS + 1];
        let rows = waveform_rows(&levels);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].1, "__");
    }

    #[test]
    fn test_txt_report_sections() {
        let decoder = decoded("7FF1122");
        let report = CaptureReport::new(&PathBuf::from("capture.bin"), &decoder);
        let txt = report.to_txt(TxtOptions {
            waveform: true,
            all_bits: false,
        });

        assert!(txt.contains("CAN Trace Report: capture.bin"));
        assert!(txt.contains("Waveform:"));
        assert!(txt.contains("SOF (1 bit)"));
        assert!(txt.contains("ID (11 bits)"));
        assert!(txt.contains("0x7FF"));
        assert!(txt.contains("0x22"));
        assert!(txt.contains("Capture restarts:   0"));
    }

    #[test]
    fn test_json_report() {
        let decoder = decoded("12301");
        let report = CaptureReport::new(&PathBuf::from("c.bin"), &decoder);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["bit_count"], decoder.bits().len());
        assert_eq!(value["fields"]["id"], 0x123);
        assert_eq!(value["fields"]["data"][0], 1);
        assert_eq!(value["labeled"][0]["field_label"], "SOF");
        assert_eq!(
            value["stuff_positions"].as_array().unwrap().len(),
            report.stuff_positions.len()
        );
    }

    #[test]
    fn test_empty_capture_report() {
        let decoder = CaptureDecoder::new();
        let report = CaptureReport::new(&PathBuf::from("empty.bin"), &decoder);
        let txt = report.to_txt(TxtOptions {
            waveform: true,
            all_bits: true,
        });
        assert!(txt.contains("Bits (0):"));
        assert!(txt.contains("(no complete fields)"));
        assert!(!txt.contains("Waveform:"));
    }
}
