//! Replay a stored capture through the decoder and print what was recovered
//!
//! Usage:
//!   replay_capture <capture.bin|capture.txt> [--chunk <bytes>]
//!   replay_capture --synth <hex frame>
//!
//! Example:
//!   replay_capture --synth 7FF1122334455667788

use can_trace_decoder::synth::encode_capture;
use can_trace_decoder::{
    CaptureConfig, CaptureDecoder, FrameBuilder, FrameDestuffer, LabeledBit, TimingConfig,
};
use std::env;
use std::path::PathBuf;

fn print_session(decoder: &CaptureDecoder) {
    let bits: String = decoder.bits().iter().map(|b| b.to_string()).collect();
    println!("Bits ({}): {}", decoder.bits().len(), bits);

    let logical = FrameDestuffer::new().destuff(decoder.bits());
    let logical: String = logical.iter().map(|b| b.to_string()).collect();
    println!("Logical bits ({}): {}", logical.len(), logical);

    println!("\nField starts:");
    for bit in decoder.labeled() {
        print_label(bit);
    }

    let stuff = decoder.labeled().iter().filter(|b| b.is_stuff_bit).count();
    println!("\nStuff bits: {}", stuff);

    println!("\nField values:");
    for (name, value) in decoder.fields().hex_values() {
        println!("  {:<6} {}", name, value);
    }

    let stats = decoder.stats();
    println!(
        "\n{} bytes fed, {} skipped, {} duplicate records, {} restarts",
        stats.bytes_fed, stats.bytes_skipped, stats.duplicates_dropped, stats.resyncs
    );
}

fn print_label(bit: &LabeledBit) {
    if let Some(label) = bit.field_label {
        println!("  {:>3}  {:<6} first bit {}", bit.logical_index, label, bit.bit);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <capture file> [--chunk <bytes>] | --synth <hex frame>", args[0]);
        std::process::exit(1);
    }

    if args[1] == "--synth" {
        let Some(hex) = args.get(2) else {
            eprintln!("--synth needs a hex frame, e.g. 7FF1122");
            std::process::exit(1);
        };
        let frame = match FrameBuilder::from_hex(hex) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };

        let bytes = encode_capture(
            &frame.transmitted().bits,
            TimingConfig::default().corrected_bit_duration(),
        );
        let mut decoder = CaptureDecoder::new();
        for chunk in bytes.chunks(CaptureConfig::default().chunk_size) {
            decoder.feed(chunk);
        }
        print_session(&decoder);
        return;
    }

    let path = PathBuf::from(&args[1]);
    let mut config = CaptureConfig::new();
    if let Some(pos) = args.iter().position(|a| a == "--chunk") {
        if let Some(size) = args.get(pos + 1).and_then(|s| s.parse().ok()) {
            config = config.with_chunk_size(size);
        }
    }

    match CaptureDecoder::decode_file(&path, &config) {
        Ok(decoder) => print_session(&decoder),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
