//! Error types for aggregation and analysis.
//!
//! Only conditions that abort a run live here. Recoverable problems
//! (a bad timestamp, a device without RSSI) are reported as
//! [`Diagnostic`](crate::models::Diagnostic) values instead.

use thiserror::Error;

/// Fatal errors raised while merging raw records.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A record lacks a usable device address.
    #[error("Malformed input: record #{index} {reason}")]
    MalformedInput { index: usize, reason: String },

    /// The input document is not a JSON array or JSON lines.
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

/// Fatal errors raised by the location analyzer.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// No device carried any readings on the signal channel.
    #[error("No analyzable data: no device has any '{channel}' readings")]
    NoAnalyzableData { channel: String },

    /// Signal data exists, but none of it belongs to a labelled device.
    #[error("No analyzable data: none of the {devices} device(s) with readings has a label")]
    NoLabelledDevices { devices: usize },

    /// The window size cannot be turned into a positive millisecond span.
    #[error("Invalid time window: {minutes} minute(s); must be a positive duration of at least 1 ms")]
    InvalidWindowSize { minutes: f64 },
}

/// A timestamp literal that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid timestamp '{literal}': {reason}")]
pub struct TimestampError {
    pub literal: String,
    pub reason: String,
}
