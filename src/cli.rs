//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SHPIA Locator - room-level location from BLE beacon RSSI
///
/// Merge raw sensor exports per device, then work out which labelled
/// location was closest in every time window.
///
/// Examples:
///   shpia aggregate data/export.json -o data/aggregated.json
///   shpia aggregate data/exports/ -o data/aggregated.json
///   shpia analyze data/aggregated.json -o analysis.json --time-window 5
///   shpia analyze data/aggregated.json --labels kitchen sofa desk
///   shpia init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .shpia.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge raw per-record JSON into one entry per device
    Aggregate(AggregateArgs),
    /// Classify every time window by closest location
    Analyze(AnalyzeArgs),
    /// Generate a default .shpia.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Raw record files (JSON array or JSON lines) or directories
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Output file path (prints to stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Field holding the device address in raw records
    #[arg(long, value_name = "FIELD")]
    pub address_field: Option<String>,

    /// Names to skip when walking input directories (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Pretty-print the aggregated JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Aggregated device data produced by `aggregate`
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file path for the analysis JSON
    ///
    /// The readable report is written next to it. Without this option
    /// the report is printed to the console.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Time window size in minutes (fractions allowed, e.g. 0.5)
    #[arg(short = 'w', long, value_name = "MINUTES", env = "SHPIA_TIME_WINDOW")]
    pub time_window: Option<f64>,

    /// Location labels, assigned to devices in the order they appear
    ///
    /// Example: --labels kitchen sofa desk
    #[arg(long, value_name = "LABELS", num_args = 1.., value_delimiter = ',')]
    pub labels: Option<Vec<String>>,

    /// Channel holding RSSI readings
    #[arg(long, value_name = "NAME")]
    pub channel: Option<String>,

    /// Report format (text, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Number of example windows shown in the report
    #[arg(long, value_name = "COUNT")]
    pub sample_windows: Option<usize>,

    /// Skip writing the readable report
    #[arg(long)]
    pub no_report: bool,

    /// Attach recovered-input diagnostics to the analysis JSON
    #[arg(long)]
    pub include_diagnostics: bool,
}

/// Format for the readable report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
}

impl ReportFormat {
    /// File suffix used when the report is written next to the JSON output.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Markdown => "md",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Aggregate(args) => {
                if let Some(ref field) = args.address_field {
                    if field.trim().is_empty() {
                        return Err("Address field must not be empty".to_string());
                    }
                }
            }
            Command::Analyze(args) => {
                if !args.input.exists() {
                    return Err(format!("Input file not found: {}", args.input.display()));
                }

                // Validate time window
                if let Some(minutes) = args.time_window {
                    if !minutes.is_finite() || minutes <= 0.0 {
                        return Err("Time window must be a positive number of minutes".to_string());
                    }
                }

                if let Some(ref labels) = args.labels {
                    if labels.iter().any(|l| l.trim().is_empty()) {
                        return Err("Labels must not be empty".to_string());
                    }
                }

                if let Some(ref channel) = args.channel {
                    if channel.trim().is_empty() {
                        return Err("Channel name must not be empty".to_string());
                    }
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
