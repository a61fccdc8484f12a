//! Data models for the location analyzer.
//!
//! This module contains the device record index produced by the
//! aggregator, the per-window results produced by the analyzer, and the
//! diagnostics both of them report for degraded input.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Insertion-ordered maps: re-inserting a key replaces the value but keeps
// the position the key was first seen at, and JSON objects round-trip in
// file order.

/// Timestamp literal -> reading.
pub type TimeSeries = IndexMap<String, f64>;

/// Channel name (e.g. `rssiValues`) -> time series.
pub type DeviceChannels = IndexMap<String, TimeSeries>;

/// Device address -> channels. The aggregator's output and the analyzer's input.
pub type DeviceRecords = IndexMap<String, DeviceChannels>;

/// Statistics for one location label within one time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStats {
    /// Mean RSSI over every pooled sample, rounded to two decimals.
    pub average_rssi: f64,
    /// Number of raw samples pooled into the average.
    pub sample_count: usize,
    /// Strongest single reading.
    pub max_rssi: f64,
    /// Weakest single reading.
    pub min_rssi: f64,
    /// Device addresses that contributed, in encounter order.
    pub devices: Vec<String>,
}

/// The classification of a single time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// Label with the strongest average signal.
    pub closest_location: String,
    /// That label's average RSSI, rounded to two decimals.
    pub closest_rssi: f64,
    /// Every label observed in the window.
    pub all_locations: BTreeMap<String, LocationStats>,
}

/// Parameters the analysis ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub time_window_minutes: f64,
    pub mac_to_label: IndexMap<String, String>,
    pub signal_channel: String,
    pub total_devices: usize,
    pub total_time_windows: usize,
}

/// The persisted analysis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAnalysis {
    pub analysis_settings: AnalysisSettings,
    /// Window start -> result. The key format sorts chronologically.
    pub time_windows: BTreeMap<String, WindowResult>,
    /// Label -> number of windows won.
    pub location_summary: BTreeMap<String, usize>,
    /// Diagnostics, only attached when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<Diagnostic>>,
}

impl LocationAnalysis {
    /// Total number of windows that produced a winner.
    pub fn windows_won(&self) -> usize {
        self.location_summary.values().sum()
    }
}

/// A recovered problem in the input. The run continued past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A sample's timestamp could not be parsed; the sample was dropped.
    TimestampParse {
        device: String,
        timestamp: String,
        reason: String,
    },
    /// A device has no readings on the signal channel; it was excluded.
    NoRssiData { device: String, channel: String },
    /// The number of supplied labels did not match the number of devices.
    LabelCountMismatch { provided: usize, devices: usize },
    /// A device has signal data but no label; it was excluded.
    UnassignedDevice { device: String },
    /// A series entry was not a number; it was dropped.
    NonNumericReading {
        device: String,
        channel: String,
        timestamp: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TimestampParse {
                device,
                timestamp,
                reason,
            } => write!(
                f,
                "Dropped sample for {} with bad timestamp '{}': {}",
                device, timestamp, reason
            ),
            Diagnostic::NoRssiData { device, channel } => {
                write!(f, "No '{}' data found for device {}", channel, device)
            }
            Diagnostic::LabelCountMismatch { provided, devices } => write!(
                f,
                "Number of labels ({}) doesn't match number of devices ({})",
                provided, devices
            ),
            Diagnostic::UnassignedDevice { device } => {
                write!(f, "Device {} has no label assignment and was skipped", device)
            }
            Diagnostic::NonNumericReading {
                device,
                channel,
                timestamp,
            } => write!(
                f,
                "Dropped non-numeric '{}' reading for {} at '{}'",
                channel, device, timestamp
            ),
        }
    }
}

/// Round to two decimals for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
