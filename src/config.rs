//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.shpia.toml` files.

use crate::aggregate::{AggregateOptions, DEFAULT_ADDRESS_FIELD};
use crate::analysis::{
    AnalysisOptions, LabelPolicy, DEFAULT_LOCATION_LABELS, DEFAULT_SIGNAL_CHANNEL,
};
use crate::cli::{Args, Command, ReportFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".shpia.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Explicit device address -> location label table.
    ///
    /// When non-empty, only the listed devices are analyzed.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Raw record aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Field that identifies the device in raw records.
    #[serde(default = "default_address_field")]
    pub address_field: String,

    /// File extensions picked up inside input directories.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Entry names skipped while walking input directories.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum input file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Pretty-print the aggregated JSON.
    #[serde(default)]
    pub pretty: bool,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            address_field: default_address_field(),
            extensions: default_extensions(),
            excludes: Vec::new(),
            max_file_size: default_max_file_size(),
            pretty: false,
        }
    }
}

fn default_address_field() -> String {
    DEFAULT_ADDRESS_FIELD.to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string(), "jsonl".to_string()]
}

fn default_max_file_size() -> u64 {
    512 * 1024 * 1024 // 512MB
}

/// Location analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Window size in minutes.
    #[serde(default = "default_time_window")]
    pub time_window_minutes: f64,

    /// Channel holding RSSI readings.
    #[serde(default = "default_signal_channel")]
    pub signal_channel: String,

    /// Labels assigned to devices in encounter order.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Fallback labels cycled once `labels` runs out.
    #[serde(default = "default_location_labels")]
    pub default_labels: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_window_minutes: default_time_window(),
            signal_channel: default_signal_channel(),
            labels: Vec::new(),
            default_labels: default_location_labels(),
        }
    }
}

fn default_time_window() -> f64 {
    1.0
}

fn default_signal_channel() -> String {
    DEFAULT_SIGNAL_CHANNEL.to_string()
}

fn default_location_labels() -> Vec<String> {
    DEFAULT_LOCATION_LABELS
        .iter()
        .map(|label| label.to_string())
        .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report format.
    #[serde(default)]
    pub format: ReportFormat,

    /// Number of example windows in the report.
    #[serde(default = "default_sample_windows")]
    pub sample_windows: usize,

    /// Write the readable report alongside the JSON output.
    #[serde(default = "default_true")]
    pub write_report: bool,

    /// Attach diagnostics to the analysis JSON.
    #[serde(default)]
    pub include_diagnostics: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            sample_windows: default_sample_windows(),
            write_report: true,
            include_diagnostics: false,
        }
    }
}

fn default_sample_windows() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::Aggregate(aggregate) => {
                if let Some(ref field) = aggregate.address_field {
                    self.aggregate.address_field = field.clone();
                }
                if let Some(ref excludes) = aggregate.exclude {
                    self.aggregate.excludes = excludes.clone();
                }
                if aggregate.pretty {
                    self.aggregate.pretty = true;
                }
            }
            Command::Analyze(analyze) => {
                if let Some(minutes) = analyze.time_window {
                    self.analysis.time_window_minutes = minutes;
                }
                if let Some(ref channel) = analyze.channel {
                    self.analysis.signal_channel = channel.clone();
                }
                // Labels on the command line replace both the ordered list
                // and any explicit table from the file.
                if let Some(ref labels) = analyze.labels {
                    self.analysis.labels = labels.clone();
                    self.labels.clear();
                }
                if let Some(format) = analyze.format {
                    self.report.format = format;
                }
                if let Some(count) = analyze.sample_windows {
                    self.report.sample_windows = count;
                }
                if analyze.no_report {
                    self.report.write_report = false;
                }
                if analyze.include_diagnostics {
                    self.report.include_diagnostics = true;
                }
            }
            Command::InitConfig => {}
        }
    }

    /// Analysis options derived from this configuration.
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            window_minutes: self.analysis.time_window_minutes,
            channel: self.analysis.signal_channel.clone(),
        }
    }

    /// Label policy derived from this configuration.
    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy {
            ordered: self.analysis.labels.clone(),
            explicit: self.labels.clone(),
            defaults: self.analysis.default_labels.clone(),
        }
    }

    /// Aggregation options derived from this configuration.
    pub fn aggregate_options(&self, show_progress: bool) -> AggregateOptions {
        AggregateOptions {
            address_field: self.aggregate.address_field.clone(),
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AnalyzeArgs;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.time_window_minutes, 1.0);
        assert_eq!(config.analysis.signal_channel, "rssiValues");
        assert_eq!(config.analysis.default_labels[0], "kitchen");
        assert_eq!(config.aggregate.address_field, "address");
        assert_eq!(config.report.sample_windows, 5);
        assert!(config.labels.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[analysis]
time_window_minutes = 0.5
labels = ["kitchen", "sofa"]

[labels]
"AA:BB:CC:DD:EE:01" = "kitchen"
"AA:BB:CC:DD:EE:02" = "sofa"

[report]
format = "markdown"
sample_windows = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.analysis.time_window_minutes, 0.5);
        assert_eq!(config.analysis.labels, vec!["kitchen", "sofa"]);
        assert_eq!(config.analysis.signal_channel, "rssiValues");
        assert_eq!(config.labels.len(), 2);
        assert_eq!(config.report.format, ReportFormat::Markdown);
        assert_eq!(config.report.sample_windows, 10);

        let policy = config.label_policy();
        assert_eq!(
            policy.explicit.get("AA:BB:CC:DD:EE:02").map(String::as_str),
            Some("sofa")
        );
    }

    #[test]
    fn test_merge_with_args() {
        let mut config: Config = toml::from_str(
            r#"
[analysis]
time_window_minutes = 5.0

[labels]
"AA" = "garage"
"#,
        )
        .unwrap();

        let args = Args {
            command: Command::Analyze(AnalyzeArgs {
                input: PathBuf::from("in.json"),
                output: None,
                time_window: None,
                labels: Some(vec!["desk".to_string()]),
                channel: Some("rssi".to_string()),
                format: None,
                sample_windows: None,
                no_report: true,
                include_diagnostics: false,
            }),
            config: None,
            verbose: true,
            quiet: false,
        };
        config.merge_with_args(&args);

        assert!(config.general.verbose);
        assert_eq!(config.analysis.time_window_minutes, 5.0);
        assert_eq!(config.analysis.labels, vec!["desk"]);
        assert!(config.labels.is_empty());
        assert!(!config.report.write_report);

        let options = config.analysis_options();
        assert_eq!(options.channel, "rssi");
        assert_eq!(options.window_minutes, 5.0);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.time_window_minutes, 1.0);
    }
}
