//! Timestamp parsing and time-window bucketing.
//!
//! Sensor timestamps look like `2025-07-14 11:42:58:448`: a plain
//! date-time followed by a colon and the fractional second. Windows are
//! epoch-aligned and identified by their start instant.

use crate::error::{AnalysisError, TimestampError};
use crate::models::{Diagnostic, DeviceRecords};
use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

const BASE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a sensor timestamp literal.
///
/// The trailing `:NNN` group is a decimal fraction of a second, so
/// `:4` means 400 ms and `:448` means 448 ms. Literals without the
/// fractional group are accepted as whole seconds.
pub fn parse_timestamp(literal: &str) -> Result<NaiveDateTime, TimestampError> {
    let err = |reason: &str| TimestampError {
        literal: literal.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = literal.trim();

    if let Some((base, fraction)) = trimmed.rsplit_once(':') {
        if let Ok(seconds) = NaiveDateTime::parse_from_str(base, BASE_FORMAT) {
            if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err("fractional seconds must be digits"));
            }
            let digits: String = fraction.chars().chain("000000000".chars()).take(9).collect();
            let nanos: i64 = digits
                .parse()
                .map_err(|_| err("fractional seconds out of range"))?;
            return Ok(seconds + chrono::Duration::nanoseconds(nanos));
        }
    }

    NaiveDateTime::parse_from_str(trimmed, BASE_FORMAT)
        .map_err(|e| err(&format!("expected 'YYYY-MM-DD HH:MM:SS:mmm' ({})", e)))
}

/// A validated window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    millis: i64,
}

impl WindowSize {
    /// Build a window size from (possibly fractional) minutes.
    pub fn from_minutes(minutes: f64) -> Result<Self, AnalysisError> {
        let invalid = AnalysisError::InvalidWindowSize { minutes };
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(invalid);
        }
        let millis = (minutes * 60_000.0).round();
        if millis < 1.0 || millis > i64::MAX as f64 {
            return Err(invalid);
        }
        Ok(Self {
            millis: millis as i64,
        })
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// Start of the window containing `instant`, in epoch milliseconds.
    pub fn window_start(&self, instant: NaiveDateTime) -> i64 {
        let ms = instant.and_utc().timestamp_millis();
        ms.div_euclid(self.millis) * self.millis
    }

    /// Render a window start as its key.
    ///
    /// Milliseconds are only shown when the window is not a whole number
    /// of seconds, otherwise two windows could share a key.
    pub fn format_start(&self, start_ms: i64) -> String {
        let Some(start) = DateTime::from_timestamp_millis(start_ms) else {
            return start_ms.to_string();
        };
        let start = start.naive_utc();
        if self.millis % 1000 == 0 {
            start.format(BASE_FORMAT).to_string()
        } else {
            format!(
                "{}:{:03}",
                start.format(BASE_FORMAT),
                start_ms.rem_euclid(1000)
            )
        }
    }
}

/// Running totals for one device in one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceWindow {
    pub sum: f64,
    pub count: usize,
    pub max: f64,
    pub min: f64,
}

impl Default for DeviceWindow {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
        }
    }
}

impl DeviceWindow {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Window start (epoch ms) -> device address -> running totals.
pub type WindowIndex = BTreeMap<i64, IndexMap<String, DeviceWindow>>;

/// Result of bucketing every device's signal channel.
#[derive(Debug, Clone, Default)]
pub struct WindowIndexOutcome {
    pub index: WindowIndex,
    /// Devices that contributed at least one sample, in encounter order.
    pub devices_with_data: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bucket every device's signal readings into fixed windows.
///
/// Devices without the channel, or with an empty one, are excluded and
/// reported. Samples with unparsable timestamps are dropped and reported.
pub fn build_window_index(
    records: &DeviceRecords,
    channel: &str,
    window: WindowSize,
) -> WindowIndexOutcome {
    let mut outcome = WindowIndexOutcome::default();

    for (device, channels) in records.iter() {
        let series = match channels.get(channel) {
            Some(series) if !series.is_empty() => series,
            _ => {
                outcome.diagnostics.push(Diagnostic::NoRssiData {
                    device: device.to_string(),
                    channel: channel.to_string(),
                });
                continue;
            }
        };

        info!("Processing {} {} readings for {}", series.len(), channel, device);

        let mut accepted = 0usize;
        for (timestamp, &value) in series.iter() {
            let instant = match parse_timestamp(timestamp) {
                Ok(instant) => instant,
                Err(e) => {
                    outcome.diagnostics.push(Diagnostic::TimestampParse {
                        device: device.to_string(),
                        timestamp: timestamp.to_string(),
                        reason: e.reason,
                    });
                    continue;
                }
            };

            let start = window.window_start(instant);
            outcome
                .index
                .entry(start)
                .or_default()
                .entry(device.clone())
                .or_default()
                .push(value);
            accepted += 1;
        }

        if accepted > 0 {
            outcome.devices_with_data.push(device.to_string());
        } else {
            debug!("Every {} timestamp for {} was rejected", channel, device);
        }
    }

    outcome
}
