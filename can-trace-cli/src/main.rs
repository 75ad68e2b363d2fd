//! CAN Trace CLI Application
//!
//! Command-line replay tool for raw logic-level CAN captures.
//! It uses the can-trace-decoder library and adds:
//! - Parallel decoding of several capture files
//! - TXT/JSON report generation
//! - Synthesis of known frames as raw captures for testing a setup

use anyhow::{bail, Context, Result};
use can_trace_decoder::synth::encode_capture;
use can_trace_decoder::{CaptureDecoder, FrameBuilder};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::{CaptureReport, TxtOptions};

/// CAN Trace - Recover CAN bits and frame fields from logic captures
#[derive(Parser, Debug)]
#[command(name = "can-trace-cli")]
#[command(about = "Decode raw logic-level CAN captures", long_about = None)]
#[command(version)]
struct Args {
    /// Capture file(s) to decode: raw binary or byte-literal dumps (can be repeated)
    #[arg(short, long, value_name = "FILE", num_args = 1..)]
    input: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for the report(s) (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write one report per input into this directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Report format: txt or json
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Bytes fed to the decoder per read
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Nominal ticks per bit period
    #[arg(long, value_name = "TICKS")]
    bit_duration: Option<f64>,

    /// Keep the nominal bit duration for the whole capture
    #[arg(long)]
    no_drift: bool,

    /// List every bit in the TXT report, not only field starts and stuff bits
    #[arg(long)]
    all_bits: bool,

    /// Leave the ASCII waveform out of the TXT report
    #[arg(long)]
    no_waveform: bool,

    /// Synthesize a frame from hex (3 ID digits + data bytes, e.g. 7FF1122)
    #[arg(long, value_name = "HEX")]
    synth: Option<String>,

    /// Write the synthesized frame as a raw capture file
    #[arg(long, value_name = "FILE", requires = "synth")]
    synth_output: Option<PathBuf>,

    /// Ticks per bit used when synthesizing (default: the drift-corrected duration)
    #[arg(long, value_name = "TICKS")]
    synth_duration: Option<f64>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Trace CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_trace_decoder::VERSION);

    let config = resolve_config(&args)?;

    if let Some(hex) = &args.synth {
        synth_mode(hex, &args, &config)?;
    } else if !config.input.files.is_empty() {
        decode_mode(&config, args.output.as_deref())?;
    } else {
        // No input - show help
        println!("CAN Trace - No input specified");
        println!("\nQuick Start:");
        println!("  can-trace-cli --input capture.bin");
        println!("  can-trace-cli --input a.bin b.txt --format json --output-dir reports");
        println!("\nSynthesize a test capture:");
        println!("  can-trace-cli --synth 7FF1122 --synth-output frame.bin");
        println!("\nWith a configuration file:");
        println!("  can-trace-cli --config config.toml");
        println!("\nUse --help for more options");
    }

    Ok(())
}

/// Load config.toml if given and apply command line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            let config = config::load_config(path)?;
            log::debug!("Configuration loaded successfully");
            config
        }
        None => AppConfig::default(),
    };

    if !args.input.is_empty() {
        config.input.files = args.input.clone();
    }
    if let Some(size) = args.chunk_size {
        config.input.chunk_size = size;
    }
    if let Some(ticks) = args.bit_duration {
        config.timing = config.timing.with_bit_duration(ticks);
    }
    if args.no_drift {
        config.timing = config.timing.without_drift_correction();
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(dir) = &args.output_dir {
        config.output.output_dir = Some(dir.clone());
    }
    if args.all_bits {
        config.output.all_bits = true;
    }
    if args.no_waveform {
        config.output.waveform = false;
    }

    config
        .capture_config()
        .validate()
        .context("Invalid decoder settings")?;
    Ok(config)
}

/// Decode every input file and write the reports
fn decode_mode(config: &AppConfig, output: Option<&Path>) -> Result<()> {
    let capture_config = config.capture_config();
    let files = &config.input.files;

    log::info!("Decoding {} capture file(s)", files.len());

    // One independent session per file
    let sessions: Vec<(&PathBuf, Result<CaptureDecoder>)> = files
        .par_iter()
        .map(|path| {
            let session = CaptureDecoder::decode_file(path, &capture_config)
                .with_context(|| format!("Failed to decode capture: {:?}", path));
            (path, session)
        })
        .collect();

    let mut failed = 0;
    let mut reports = Vec::new();
    for (path, session) in &sessions {
        match session {
            Ok(decoder) => reports.push(CaptureReport::new(path, decoder)),
            Err(e) => {
                log::error!("{:#}", e);
                failed += 1;
            }
        }
    }

    let options = TxtOptions {
        waveform: config.output.waveform,
        all_bits: config.output.all_bits,
    };
    let format = config.output.format;

    if let Some(dir) = &config.output.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        for report in &reports {
            let stem = Path::new(&report.source)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "capture".to_string());
            let path = dir.join(format!("{}.{}", stem, format.extension()));
            let content = match format {
                OutputFormat::Txt => report.to_txt(options),
                OutputFormat::Json => report.to_json()?,
            };
            fs::write(&path, content)
                .with_context(|| format!("Failed to write report: {:?}", path))?;
            log::info!("Wrote {:?}", path);
        }
    } else {
        let content = match format {
            OutputFormat::Txt => reports
                .iter()
                .map(|r| r.to_txt(options))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Json if reports.len() == 1 => reports[0].to_json()?,
            OutputFormat::Json => serde_json::to_string_pretty(&reports)?,
        };
        match output {
            Some(path) => {
                fs::write(path, content)
                    .with_context(|| format!("Failed to write report: {:?}", path))?;
                log::info!("Wrote {:?}", path);
            }
            None => print!("{}", content),
        }
    }

    if failed > 0 {
        bail!("{} of {} capture file(s) could not be decoded", failed, files.len());
    }
    Ok(())
}

/// Build a frame from hex, then write it as a capture or replay it directly
fn synth_mode(hex: &str, args: &Args, config: &AppConfig) -> Result<()> {
    let frame = FrameBuilder::from_hex(hex).with_context(|| format!("Invalid frame: {}", hex))?;
    let transmitted = frame.transmitted();
    let ticks = args
        .synth_duration
        .unwrap_or_else(|| config.timing.corrected_bit_duration());
    let bytes = encode_capture(&transmitted.bits, ticks);

    log::info!(
        "Synthesized ID 0x{:03X} with {} data byte(s): {} bits, stuff bits at {:?}",
        frame.id(),
        frame.data().len(),
        transmitted.bits.len(),
        transmitted.stuff_positions
    );

    if let Some(path) = &args.synth_output {
        fs::write(path, &bytes).with_context(|| format!("Failed to write capture: {:?}", path))?;
        println!("Wrote {} records to {:?}", bytes.len() / 8, path);
        return Ok(());
    }

    // No output file: replay straight through a session
    let capture_config = config.capture_config();
    let mut decoder = CaptureDecoder::with_timing(capture_config.timing.clone())?;
    for chunk in bytes.chunks(capture_config.chunk_size) {
        decoder.feed(chunk);
    }
    if decoder.bits() != transmitted.bits.as_slice() {
        log::warn!("Replayed bits differ from the synthesized frame");
    }

    let source = PathBuf::from(format!("synth:{}", hex));
    let report = CaptureReport::new(&source, &decoder);
    match config.output.format {
        OutputFormat::Txt => print!(
            "{}",
            report.to_txt(TxtOptions {
                waveform: config.output.waveform,
                all_bits: config.output.all_bits,
            })
        ),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
