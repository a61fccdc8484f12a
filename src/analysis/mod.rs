//! Location analysis.
//!
//! Buckets RSSI readings into time windows and decides, per window,
//! which labelled location the tracked devices were closest to.

pub mod analyzer;
pub mod classify;
pub mod labels;
pub mod window;

pub use analyzer::{analyze_with_policy, AnalysisOptions, DEFAULT_SIGNAL_CHANNEL};
pub use labels::{LabelPolicy, DEFAULT_LOCATION_LABELS};
