//! Top-level location analysis.
//!
//! Ties the pieces together: bucket readings into windows, classify each
//! window in chronological order, then count wins per label.

use super::classify::{classify_window, summarize};
use super::labels::{assign_labels, signal_devices, LabelAssignment, LabelPolicy};
use super::window::{build_window_index, WindowSize};
use crate::error::AnalysisError;
use crate::models::{AnalysisSettings, DeviceRecords, Diagnostic, LocationAnalysis};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Channel that carries RSSI readings in aggregated records.
pub const DEFAULT_SIGNAL_CHANNEL: &str = "rssiValues";

/// Knobs for a single analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Window length in minutes; fractions are allowed.
    pub window_minutes: f64,
    /// Name of the signal-strength channel.
    pub channel: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            window_minutes: 1.0,
            channel: DEFAULT_SIGNAL_CHANNEL.to_string(),
        }
    }
}

/// A finished analysis plus everything that was recovered along the way.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: LocationAnalysis,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze `records` with a ready-made label assignment.
pub fn analyze(
    records: &DeviceRecords,
    assignment: &LabelAssignment,
    options: &AnalysisOptions,
) -> Result<Analysis, AnalysisError> {
    let window = WindowSize::from_minutes(options.window_minutes)?;

    info!("Processing {} devices for location analysis...", records.len());
    let outcome = build_window_index(records, &options.channel, window);
    let mut diagnostics = outcome.diagnostics;

    if outcome.index.is_empty() {
        return Err(AnalysisError::NoAnalyzableData {
            channel: options.channel.clone(),
        });
    }

    for device in &outcome.devices_with_data {
        if !assignment.contains_key(device) {
            diagnostics.push(Diagnostic::UnassignedDevice {
                device: device.clone(),
            });
        }
    }

    info!("Analyzing {} time windows for location...", outcome.index.len());

    let mut time_windows = BTreeMap::new();
    for (&start, devices) in &outcome.index {
        let key = window.format_start(start);
        match classify_window(devices, assignment) {
            Some(result) => {
                debug!(
                    "{}: {} ({:.2} dBm)",
                    key, result.closest_location, result.closest_rssi
                );
                time_windows.insert(key, result);
            }
            None => debug!("{}: no labelled devices, skipped", key),
        }
    }

    if time_windows.is_empty() {
        return Err(AnalysisError::NoLabelledDevices {
            devices: outcome.devices_with_data.len(),
        });
    }

    let location_summary = summarize(time_windows.values());

    let report = LocationAnalysis {
        analysis_settings: AnalysisSettings {
            time_window_minutes: options.window_minutes,
            mac_to_label: assignment.clone(),
            signal_channel: options.channel.clone(),
            total_devices: outcome.devices_with_data.len(),
            total_time_windows: time_windows.len(),
        },
        time_windows,
        location_summary,
        diagnostics: None,
    };

    Ok(Analysis {
        report,
        diagnostics,
    })
}

/// Assign labels per `policy`, then analyze.
///
/// Label diagnostics come first in the returned list.
pub fn analyze_with_policy(
    records: &DeviceRecords,
    policy: &LabelPolicy,
    options: &AnalysisOptions,
) -> Result<Analysis, AnalysisError> {
    let devices = signal_devices(records, &options.channel);
    let (assignment, mut diagnostics) = assign_labels(&devices, policy);
    info!("Assigned location labels to {} device(s)", assignment.len());

    let mut analysis = analyze(records, &assignment, options)?;
    diagnostics.append(&mut analysis.diagnostics);
    analysis.diagnostics = diagnostics;

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceChannels, TimeSeries};

    fn device(samples: &[(&str, f64)]) -> DeviceChannels {
        let series: TimeSeries = samples
            .iter()
            .map(|(ts, v)| (ts.to_string(), *v))
            .collect();
        let mut channels = DeviceChannels::new();
        channels.insert(DEFAULT_SIGNAL_CHANNEL.to_string(), series);
        channels
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelAssignment {
        pairs
            .iter()
            .map(|(d, l)| (d.to_string(), l.to_string()))
            .collect()
    }

    fn sample_records() -> DeviceRecords {
        let mut records = DeviceRecords::new();
        records.insert(
            "AA:AA".to_string(),
            device(&[
                ("2025-07-14 11:42:01:000", -60.0),
                ("2025-07-14 11:42:40:500", -60.0),
                ("2025-07-14 11:43:05:000", -80.0),
            ]),
        );
        records.insert(
            "BB:BB".to_string(),
            device(&[
                ("2025-07-14 11:42:10:000", -70.0),
                ("2025-07-14 11:43:30:000", -65.0),
                ("2025-07-14 11:45:00:000", -90.0),
            ]),
        );
        records
    }

    #[test]
    fn test_analyze_two_devices() {
        let analysis = analyze(
            &sample_records(),
            &labels(&[("AA:AA", "kitchen"), ("BB:BB", "sofa")]),
            &AnalysisOptions::default(),
        )
        .unwrap();
        let report = &analysis.report;

        assert!(analysis.diagnostics.is_empty());
        let keys: Vec<_> = report.time_windows.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "2025-07-14 11:42:00",
                "2025-07-14 11:43:00",
                "2025-07-14 11:45:00"
            ]
        );

        let first = &report.time_windows["2025-07-14 11:42:00"];
        assert_eq!(first.closest_location, "kitchen");
        assert_eq!(first.closest_rssi, -60.0);

        assert_eq!(
            report.time_windows["2025-07-14 11:43:00"].closest_location,
            "sofa"
        );
        assert_eq!(report.location_summary.get("kitchen"), Some(&1));
        assert_eq!(report.location_summary.get("sofa"), Some(&2));
        assert_eq!(report.analysis_settings.total_time_windows, 3);
        assert_eq!(report.analysis_settings.total_devices, 2);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let records = sample_records();
        let assignment = labels(&[("AA:AA", "kitchen"), ("BB:BB", "sofa")]);
        let options = AnalysisOptions {
            window_minutes: 0.5,
            ..Default::default()
        };

        let first = analyze(&records, &assignment, &options).unwrap();
        let second = analyze(&records, &assignment, &options).unwrap();

        assert_eq!(
            serde_json::to_string_pretty(&first.report).unwrap(),
            serde_json::to_string_pretty(&second.report).unwrap()
        );
    }

    #[test]
    fn test_every_labelled_device_appears() {
        let records = sample_records();
        let assignment = labels(&[("AA:AA", "kitchen"), ("BB:BB", "sofa")]);
        let analysis = analyze(&records, &assignment, &AnalysisOptions::default()).unwrap();

        for (_, label) in assignment.iter() {
            assert!(analysis
                .report
                .time_windows
                .values()
                .any(|w| w.all_locations.contains_key(label)));
        }
    }

    #[test]
    fn test_device_without_rssi_is_excluded() {
        let mut records = sample_records();
        let mut accel = DeviceChannels::new();
        accel.insert(
            "accelerometerValues_x".to_string(),
            [("2025-07-14 11:42:01:000".to_string(), 0.01)]
                .into_iter()
                .collect(),
        );
        records.insert("CC:CC".to_string(), accel);
        records.insert("DD:DD".to_string(), device(&[]));

        let analysis =
            analyze_with_policy(&records, &LabelPolicy::default(), &AnalysisOptions::default())
                .unwrap();

        let settings = &analysis.report.analysis_settings;
        assert_eq!(settings.mac_to_label.len(), 2);
        assert!(!settings.mac_to_label.contains_key("CC:CC"));
        assert!(!settings.mac_to_label.contains_key("DD:DD"));
        assert_eq!(
            analysis
                .diagnostics
                .iter()
                .filter(|d| matches!(d, Diagnostic::NoRssiData { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_no_signal_data_is_fatal() {
        let mut records = DeviceRecords::new();
        records.insert("AA:AA".to_string(), device(&[]));
        records.insert("BB:BB".to_string(), DeviceChannels::new());

        let err = analyze_with_policy(&records, &LabelPolicy::default(), &AnalysisOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::NoAnalyzableData {
                channel: DEFAULT_SIGNAL_CHANNEL.to_string()
            }
        );
    }

    #[test]
    fn test_unlabelled_data_is_reported() {
        let records = sample_records();
        let analysis = analyze(
            &records,
            &labels(&[("AA:AA", "kitchen")]),
            &AnalysisOptions::default(),
        )
        .unwrap();

        assert_eq!(
            analysis.diagnostics,
            vec![Diagnostic::UnassignedDevice {
                device: "BB:BB".to_string()
            }]
        );
        // 11:45 only had BB:BB, so it produces no window.
        assert_eq!(analysis.report.time_windows.len(), 2);

        let err = analyze(&records, &LabelAssignment::new(), &AnalysisOptions::default())
            .unwrap_err();
        assert_eq!(err, AnalysisError::NoLabelledDevices { devices: 2 });
    }

    #[test]
    fn test_invalid_window_size() {
        let options = AnalysisOptions {
            window_minutes: 0.0,
            ..Default::default()
        };
        let err = analyze_with_policy(&sample_records(), &LabelPolicy::default(), &options)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidWindowSize { .. }));
    }

    #[test]
    fn test_policy_labels_follow_encounter_order() {
        let policy = LabelPolicy {
            ordered: vec!["sofa".to_string(), "desk".to_string()],
            ..Default::default()
        };
        let analysis =
            analyze_with_policy(&sample_records(), &policy, &AnalysisOptions::default()).unwrap();

        let labels: Vec<_> = analysis
            .report
            .analysis_settings
            .mac_to_label
            .iter()
            .map(|(d, l)| format!("{}={}", d, l))
            .collect();
        assert_eq!(labels, vec!["AA:AA=sofa", "BB:BB=desk"]);
    }

    #[test]
    fn test_padded_device_keeps_its_own_location() {
        let mut records = DeviceRecords::new();
        records.insert(
            "AA".to_string(),
            device(&[("2025-07-14 11:42:01:000", -50.0)]),
        );
        records.insert(
            "BB".to_string(),
            device(&[("2025-07-14 11:42:02:000", -90.0)]),
        );
        let policy = LabelPolicy {
            ordered: vec!["living_room".to_string()],
            ..Default::default()
        };

        let analysis =
            analyze_with_policy(&records, &policy, &AnalysisOptions::default()).unwrap();
        let settings = &analysis.report.analysis_settings;
        assert_ne!(settings.mac_to_label["AA"], settings.mac_to_label["BB"]);

        let window = &analysis.report.time_windows["2025-07-14 11:42:00"];
        assert_eq!(window.all_locations.len(), 2);
        assert_eq!(window.closest_location, "living_room");
        assert_eq!(window.closest_rssi, -50.0);
        assert!(analysis
            .diagnostics
            .contains(&Diagnostic::LabelCountMismatch { provided: 1, devices: 2 }));
    }
}
