//! Report output: analysis JSON and the readable report.

pub mod generator;

pub use generator::{generate_json_report, generate_report, report_path};
