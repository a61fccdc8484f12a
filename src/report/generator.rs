//! Readable report generation.
//!
//! Renders a finished [`LocationAnalysis`] as plain text or Markdown.
//! Everything here is formatting only; the analysis is never recomputed.

use crate::cli::ReportFormat;
use crate::models::{LocationAnalysis, WindowResult};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 70;

/// Generate the report in the requested format.
pub fn generate_report(
    analysis: &LocationAnalysis,
    format: ReportFormat,
    sample_windows: usize,
) -> String {
    match format {
        ReportFormat::Text => generate_text_report(analysis, sample_windows),
        ReportFormat::Markdown => generate_markdown_report(analysis, sample_windows),
    }
}

/// Generate a plain text report.
pub fn generate_text_report(analysis: &LocationAnalysis, sample_windows: usize) -> String {
    let settings = &analysis.analysis_settings;
    let mut output = String::new();

    output.push_str(&"=".repeat(RULE_WIDTH));
    output.push('\n');
    output.push_str("SHPIA LOCATION ANALYSIS REPORT\n");
    output.push_str(&"=".repeat(RULE_WIDTH));
    output.push('\n');

    output.push_str(&format!(
        "Time Window: {} minute(s)\n",
        settings.time_window_minutes
    ));
    output.push_str(&format!("Signal Channel: {}\n", settings.signal_channel));
    output.push_str(&format!("Total Devices: {}\n", settings.total_devices));
    output.push_str(&format!(
        "Total Time Windows: {}\n\n",
        settings.total_time_windows
    ));

    output.push_str("DEVICE LABELS:\n");
    for (address, label) in settings.mac_to_label.iter() {
        output.push_str(&format!("  {}: {}\n", label, address));
    }
    output.push('\n');

    output.push_str("LOCATION FREQUENCY:\n");
    for (label, count, percentage) in location_frequency(analysis) {
        output.push_str(&format!(
            "  {}: {} windows ({:.1}%)\n",
            label, count, percentage
        ));
    }
    output.push('\n');

    output.push_str("SAMPLE WINDOWS:\n");
    for (window, result) in analysis.time_windows.iter().take(sample_windows) {
        output.push_str(&format!("  {}:\n", window));
        output.push_str(&format!(
            "    Location: {} (RSSI: {:.2} dBm)\n",
            result.closest_location, result.closest_rssi
        ));
        for (label, stats) in &result.all_locations {
            output.push_str(&format!(
                "      {}: {:.2} dBm avg, {} samples\n",
                label, stats.average_rssi, stats.sample_count
            ));
        }
    }

    if let Some(ref diagnostics) = analysis.diagnostics {
        if !diagnostics.is_empty() {
            output.push_str("\nWARNINGS:\n");
            for diagnostic in diagnostics {
                output.push_str(&format!("  - {}\n", diagnostic));
            }
        }
    }

    output
}

/// Generate a Markdown report.
pub fn generate_markdown_report(analysis: &LocationAnalysis, sample_windows: usize) -> String {
    let mut output = String::new();

    output.push_str("# SHPIA Location Analysis Report\n\n");
    output.push_str(&generate_settings_section(analysis));
    output.push_str(&generate_labels_section(analysis));
    output.push_str(&generate_frequency_section(analysis));
    output.push_str(&generate_windows_section(analysis, sample_windows));

    if let Some(ref diagnostics) = analysis.diagnostics {
        if !diagnostics.is_empty() {
            output.push_str("## Warnings\n\n");
            for diagnostic in diagnostics {
                output.push_str(&format!("- {}\n", diagnostic));
            }
            output.push('\n');
        }
    }

    output.push_str("---\n\n");
    output.push_str(&format!(
        "*Report generated by shpia v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    output
}

fn generate_settings_section(analysis: &LocationAnalysis) -> String {
    let settings = &analysis.analysis_settings;
    let mut section = String::new();

    section.push_str("## Settings\n\n");
    section.push_str(&format!(
        "- **Time Window:** {} minute(s)\n",
        settings.time_window_minutes
    ));
    section.push_str(&format!(
        "- **Signal Channel:** `{}`\n",
        settings.signal_channel
    ));
    section.push_str(&format!("- **Total Devices:** {}\n", settings.total_devices));
    section.push_str(&format!(
        "- **Total Time Windows:** {}\n\n",
        settings.total_time_windows
    ));

    section
}

fn generate_labels_section(analysis: &LocationAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Device Labels\n\n");
    section.push_str("| Label | Device |\n");
    section.push_str("|:---|:---|\n");
    for (address, label) in analysis.analysis_settings.mac_to_label.iter() {
        section.push_str(&format!("| {} | `{}` |\n", label, address));
    }
    section.push('\n');

    section
}

fn generate_frequency_section(analysis: &LocationAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Location Frequency\n\n");
    section.push_str("| Location | Windows | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for (label, count, percentage) in location_frequency(analysis) {
        section.push_str(&format!("| {} | {} | {:.1}% |\n", label, count, percentage));
    }
    section.push('\n');

    section
}

fn generate_windows_section(analysis: &LocationAnalysis, sample_windows: usize) -> String {
    let mut section = String::new();

    section.push_str("## Sample Windows\n\n");
    if analysis.time_windows.is_empty() || sample_windows == 0 {
        section.push_str("No windows to show.\n\n");
        return section;
    }

    for (window, result) in analysis.time_windows.iter().take(sample_windows) {
        section.push_str(&generate_window_block(window, result));
    }

    section
}

fn generate_window_block(window: &str, result: &WindowResult) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", window));
    block.push_str(&format!(
        "**Closest:** {} ({:.2} dBm)\n\n",
        result.closest_location, result.closest_rssi
    ));
    block.push_str("| Location | Avg RSSI | Max | Min | Samples |\n");
    block.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for (label, stats) in &result.all_locations {
        block.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} | {} |\n",
            label, stats.average_rssi, stats.max_rssi, stats.min_rssi, stats.sample_count
        ));
    }
    block.push('\n');

    block
}

/// Labels with their window counts and share of all won windows, most
/// frequent first, ties by label.
pub fn location_frequency(analysis: &LocationAnalysis) -> Vec<(&str, usize, f64)> {
    let total = analysis.windows_won();
    let mut rows: Vec<_> = analysis
        .location_summary
        .iter()
        .map(|(label, &count)| {
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (label.as_str(), count, percentage)
        })
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows
}

/// Serialize any output document as JSON.
pub fn generate_json_report<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Where the readable report goes for a given JSON output path:
/// `out.json` becomes `out_report.txt` (or `.md`) in the same directory.
pub fn report_path(output: &Path, format: ReportFormat) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "analysis".to_string());
    output.with_file_name(format!("{}_report.{}", stem, format.extension()))
}
