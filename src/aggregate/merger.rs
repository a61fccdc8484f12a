//! Merging raw sensor records into one entry per device.
//!
//! A raw record is a flat JSON object: an address field, some metadata,
//! and any number of series fields mapping timestamps to readings.
//! Records sharing an address are folded together; a timestamp seen twice
//! on the same channel keeps the later value.

use crate::error::AggregateError;
use crate::models::{DeviceRecords, Diagnostic};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Field that identifies the device in raw records.
pub const DEFAULT_ADDRESS_FIELD: &str = "address";

/// Metadata fields that are never treated as channels.
const METADATA_FIELDS: [&str; 1] = ["_id"];

/// One top-level field of a raw record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    /// An object, read as timestamp -> reading.
    Series(IndexMap<String, Value>),
    /// Anything else: identity or metadata.
    Scalar(Value),
}

/// A raw record with its fields in file order.
pub type RawRecord = IndexMap<String, RawField>;

/// Parse a document holding raw records.
///
/// Accepts a JSON array of objects, or a stream of objects (JSON lines or
/// simply concatenated).
pub fn parse_records(source_name: &str, content: &str) -> Result<Vec<RawRecord>, AggregateError> {
    let parse_err = |e: serde_json::Error| AggregateError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    };

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).map_err(parse_err);
    }

    serde_json::Deserializer::from_str(content)
        .into_iter::<RawRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_err)
}

/// Everything produced by an aggregation run.
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub records: DeviceRecords,
    pub records_processed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Folds raw records into a per-device index.
#[derive(Debug)]
pub struct Aggregator {
    address_field: String,
    devices: DeviceRecords,
    processed: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_FIELD)
    }
}

impl Aggregator {
    pub fn new(address_field: &str) -> Self {
        Self {
            address_field: address_field.to_string(),
            devices: DeviceRecords::new(),
            processed: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Merge one record.
    ///
    /// Fails if the record has no usable address; `index` in the error is
    /// the zero-based position among all records fed to this aggregator.
    pub fn merge_record(&mut self, record: &RawRecord) -> Result<(), AggregateError> {
        let index = self.processed;
        let address = match record.get(&self.address_field) {
            Some(RawField::Scalar(Value::String(address))) if !address.trim().is_empty() => {
                address.clone()
            }
            Some(_) => {
                return Err(AggregateError::MalformedInput {
                    index,
                    reason: format!("has an empty or non-string '{}' field", self.address_field),
                })
            }
            None => {
                return Err(AggregateError::MalformedInput {
                    index,
                    reason: format!("has no '{}' field", self.address_field),
                })
            }
        };
        self.processed += 1;

        let device = self.devices.entry(address.clone()).or_default();

        for (name, field) in record.iter() {
            if *name == self.address_field || METADATA_FIELDS.contains(&name.as_str()) {
                continue;
            }
            let RawField::Series(entries) = field else {
                continue;
            };

            let series = device.entry(name.clone()).or_default();
            for (timestamp, value) in entries.iter() {
                match value.as_f64() {
                    Some(reading) => {
                        series.insert(timestamp.to_string(), reading);
                    }
                    None => self.diagnostics.push(Diagnostic::NonNumericReading {
                        device: address.clone(),
                        channel: name.to_string(),
                        timestamp: timestamp.to_string(),
                    }),
                }
            }
        }

        Ok(())
    }

    pub fn finish(self) -> AggregateOutcome {
        AggregateOutcome {
            records: self.devices,
            records_processed: self.processed,
            diagnostics: self.diagnostics,
        }
    }
}
