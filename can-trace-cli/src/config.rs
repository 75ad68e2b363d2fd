//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_trace_decoder::config::DEFAULT_CHUNK_SIZE;
use can_trace_decoder::{CaptureConfig, TimingConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Bytes fed to the decoder per read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Directory for one report per input file (default: stdout)
    pub output_dir: Option<PathBuf>,
    /// Include the ASCII waveform in TXT reports
    #[serde(default = "default_true")]
    pub waveform: bool,
    /// Include every bit in the labeled-bit table, not only field starts and stuff bits
    #[serde(default)]
    pub all_bits: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            output_dir: None,
            waveform: true,
            all_bits: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected txt or json)", other)),
        }
    }
}

impl AppConfig {
    /// Decoder settings for one capture file
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig::new()
            .with_timing(self.timing.clone())
            .with_chunk_size(self.input.chunk_size)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .capture_config()
        .validate()
        .with_context(|| format!("Invalid settings in config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            files = ["capture.bin", "second.txt"]
            chunk_size = 64

            [timing]
            nominal_bit_duration = 10.0

            [output]
            format = "json"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.files.len(), 2);
        assert_eq!(config.input.chunk_size, 64);
        assert_eq!(config.timing.nominal_bit_duration, 10.0);
        // The default drift ratio carries over to the new nominal duration
        assert_eq!(config.timing.drift_ratio, 1.005);
        assert!((config.timing.corrected_bit_duration() - 10.05).abs() < 1e-9);
        assert_eq!(config.timing.tie_occupancy(), 5.0);
        assert!(config.capture_config().validate().is_ok());
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.waveform);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.files.is_empty());
        assert_eq!(config.input.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.output.format, OutputFormat::Txt);
    }

    #[test]
    fn test_load_config_nominal_duration_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[timing]\nnominal_bit_duration = 10.0\n").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.timing.bit_duration_for(40), 10.0);
        assert!((config.timing.bit_duration_for(41) - 10.05).abs() < 1e-9);
    }

    #[test]
    fn test_load_config_rejects_bad_timing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[timing]\nnominal_bit_duration = -1.0\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TXT".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
