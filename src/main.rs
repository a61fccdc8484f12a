//! SHPIA Locator - room-level location from BLE beacon RSSI
//!
//! A CLI tool that merges raw sensor exports per device and works out,
//! for every time window, which labelled location was closest.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any fatal error (bad input, no analyzable data, bad config, etc.)

mod aggregate;
mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod scanner;

use anyhow::{Context, Result};
use cli::{AggregateArgs, AnalyzeArgs, Args, Command};
use config::{Config, CONFIG_FILE_NAME};
use models::DeviceRecords;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("shpia v{}", env!("CARGO_PKG_VERSION"));
    match config_source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    let result = match &args.command {
        Command::Aggregate(aggregate_args) => run_aggregate(aggregate_args, &config, !args.quiet),
        Command::Analyze(analyze_args) => run_analyze(analyze_args, &config),
        Command::InitConfig => Ok(()),
    };

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .shpia.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize window size, labels, channel, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so JSON written to stdout stays clean.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Merge raw record files into one entry per device.
fn run_aggregate(args: &AggregateArgs, config: &Config, show_progress: bool) -> Result<()> {
    let start_time = Instant::now();
    // Status lines only when stdout isn't carrying the JSON.
    let announce = args.output.is_some();

    let scanner = scanner::InputScanner::new(scanner::ScanConfig::from(&config.aggregate));
    let files = scanner.scan(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No record files found in the given inputs");
    }

    if announce {
        println!("📥 Reading {} record file(s)...", files.len());
    }
    let options = config.aggregate_options(show_progress && announce);
    let outcome = aggregate::aggregate_files(&files, &options)?;

    for diagnostic in &outcome.diagnostics {
        warn!("{}", diagnostic);
    }

    let json = report::generate_json_report(&outcome.records, config.aggregate.pretty)?;

    match args.output {
        Some(ref path) => {
            write_output(path, &json)?;
            println!("\n📊 Aggregation Summary:");
            println!("   Records processed: {}", outcome.records_processed);
            println!("   Devices: {}", outcome.records.len());
            if !outcome.diagnostics.is_empty() {
                println!("   Dropped readings: {}", outcome.diagnostics.len());
            }
            println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
            println!("\n✅ Aggregated data saved to: {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Classify every time window of an aggregated file.
///
/// Nothing is written unless the analysis succeeds.
fn run_analyze(args: &AnalyzeArgs, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    println!("📥 Loading aggregated data from {}", args.input.display());
    let records = load_records(&args.input)?;

    let options = config.analysis_options();
    println!("\n🔬 Analyzing location...");
    println!("   Time window: {} minute(s)", options.window_minutes);
    println!("   Signal channel: {}", options.channel);

    let outcome = analysis::analyze_with_policy(&records, &config.label_policy(), &options)?;
    for diagnostic in &outcome.diagnostics {
        warn!("{}", diagnostic);
    }

    let mut result = outcome.report;
    if config.report.include_diagnostics {
        result.diagnostics = Some(outcome.diagnostics.clone());
    }

    let readable = if config.report.write_report {
        Some(report::generate_report(
            &result,
            config.report.format,
            config.report.sample_windows,
        ))
    } else {
        None
    };

    match args.output {
        Some(ref path) => {
            let json = report::generate_json_report(&result, true)?;
            let report_file = report::report_path(path, config.report.format);
            write_analysis(path, &json, &report_file, readable.as_deref())?;
            println!("\n✅ Analysis results saved to: {}", path.display());
            if readable.is_some() {
                println!("   Report saved to: {}", report_file.display());
            }
        }
        None => match readable {
            Some(ref readable) => println!("\n{}", readable),
            None => println!("{}", report::generate_json_report(&result, true)?),
        },
    }

    let settings = &result.analysis_settings;
    println!("\n📊 Analysis Summary:");
    println!("   Devices: {}", settings.total_devices);
    println!("   Time windows: {}", settings.total_time_windows);
    if !outcome.diagnostics.is_empty() {
        println!("   ⚠️  Warnings: {}", outcome.diagnostics.len());
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Read an aggregated file produced by `aggregate`.
fn load_records(path: &Path) -> Result<DeviceRecords> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let records: DeviceRecords = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse aggregated data: {}", path.display()))?;
    debug!("Loaded {} devices from {}", records.len(), path.display());
    Ok(records)
}

/// Write the readable report, then the analysis JSON.
///
/// If the JSON cannot be written the report is removed again, so a failed
/// run leaves neither file behind.
fn write_analysis(
    json_path: &Path,
    json: &str,
    report_path: &Path,
    readable: Option<&str>,
) -> Result<()> {
    if let Some(readable) = readable {
        write_output(report_path, readable)?;
    }

    if let Err(e) = write_output(json_path, json) {
        if readable.is_some() {
            let _ = std::fs::remove_file(report_path);
        }
        return Err(e);
    }

    Ok(())
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output to {}", path.display()))
}

/// Load configuration from file or use defaults.
///
/// Returns the path the configuration came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::models::LocationAnalysis;
    use tempfile::TempDir;

    const SAMPLE_RECORDS: &str = include_str!("../fixtures/sample_records.json");

    fn analyze_args(input: PathBuf, output: Option<PathBuf>) -> AnalyzeArgs {
        AnalyzeArgs {
            input,
            output,
            time_window: None,
            labels: None,
            channel: None,
            format: None,
            sample_windows: None,
            no_report: false,
            include_diagnostics: false,
        }
    }

    /// Aggregate the sample fixture into `dir` and return the output path.
    fn aggregate_sample(dir: &Path) -> PathBuf {
        let raw = dir.join("raw.json");
        std::fs::write(&raw, SAMPLE_RECORDS).unwrap();
        let aggregated = dir.join("aggregated.json");

        let args = AggregateArgs {
            inputs: vec![raw],
            output: Some(aggregated.clone()),
            address_field: None,
            exclude: None,
            pretty: true,
        };
        run_aggregate(&args, &Config::default(), false).unwrap();
        aggregated
    }

    #[test]
    fn test_aggregate_sample_fixture() {
        let temp_dir = TempDir::new().unwrap();
        let aggregated = aggregate_sample(temp_dir.path());

        let records = load_records(&aggregated).unwrap();
        assert_eq!(
            records.keys().collect::<Vec<_>>(),
            vec!["C4:64:E3:0A:11:01", "C4:64:E3:0A:11:02", "D1:77:00:9B:22:03"]
        );
        let rssi = records
            .get("C4:64:E3:0A:11:01")
            .unwrap()
            .get("rssiValues")
            .unwrap();
        assert_eq!(rssi.get("2025-07-14 11:42:59:102"), Some(&-62.0));
        assert_eq!(rssi.len(), 4);
    }

    #[test]
    fn test_analyze_writes_json_and_report() {
        let temp_dir = TempDir::new().unwrap();
        let aggregated = aggregate_sample(temp_dir.path());
        let output = temp_dir.path().join("analysis.json");

        let mut config = Config::default();
        config.report.include_diagnostics = true;
        run_analyze(&analyze_args(aggregated, Some(output.clone())), &config).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let result: LocationAnalysis = serde_json::from_str(&content).unwrap();

        assert_eq!(result.analysis_settings.total_devices, 2);
        assert_eq!(result.analysis_settings.total_time_windows, 2);
        assert_eq!(
            result.time_windows["2025-07-14 11:42:00"].closest_location,
            "kitchen"
        );
        assert_eq!(
            result.time_windows["2025-07-14 11:43:00"].closest_location,
            "living_room"
        );
        assert_eq!(result.location_summary["kitchen"], 1);
        assert_eq!(result.location_summary["living_room"], 1);
        assert!(result.diagnostics.unwrap().len() >= 2);

        let report_file = temp_dir.path().join("analysis_report.txt");
        let report = std::fs::read_to_string(report_file).unwrap();
        assert!(report.contains("kitchen: 1 windows (50.0%)"));
    }

    #[test]
    fn test_analyze_no_report() {
        let temp_dir = TempDir::new().unwrap();
        let aggregated = aggregate_sample(temp_dir.path());
        let output = temp_dir.path().join("analysis.json");

        let mut config = Config::default();
        config.report.write_report = false;
        run_analyze(&analyze_args(aggregated, Some(output.clone())), &config).unwrap();

        assert!(output.exists());
        assert!(!temp_dir.path().join("analysis_report.txt").exists());
    }

    #[test]
    fn test_no_output_written_without_analyzable_data() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("aggregated.json");
        std::fs::write(&input, r#"{"AA": {"accelerometerValues_x": {"t1": 0.1}}}"#).unwrap();
        let output = temp_dir.path().join("analysis.json");

        let err = run_analyze(&analyze_args(input, Some(output.clone())), &Config::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::NoAnalyzableData { .. })
        ));
        assert!(!output.exists());
        assert!(!temp_dir.path().join("analysis_report.txt").exists());
    }

    #[test]
    fn test_failed_report_write_leaves_no_json() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("analysis.json");
        let report_file = temp_dir.path().join("missing").join("analysis_report.txt");

        assert!(write_analysis(&json_path, "{}", &report_file, Some("report")).is_err());
        assert!(!json_path.exists());
    }

    #[test]
    fn test_failed_json_write_removes_report() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("missing").join("analysis.json");
        let report_file = temp_dir.path().join("analysis_report.txt");

        assert!(write_analysis(&json_path, "{}", &report_file, Some("report")).is_err());
        assert!(!report_file.exists());
    }

    #[test]
    fn test_invalid_aggregated_input() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("aggregated.json");
        std::fs::write(&input, "[1, 2, 3]").unwrap();

        assert!(load_records(&input).is_err());
    }
}
