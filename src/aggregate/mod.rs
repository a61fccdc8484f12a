//! Raw record aggregation.
//!
//! Reads exported telemetry batches and folds them into the per-device
//! index that the location analyzer consumes.

pub mod merger;

pub use merger::{parse_records, AggregateOutcome, Aggregator, DEFAULT_ADDRESS_FIELD};

use crate::scanner::ScannedFile;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Options for aggregating files.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Field holding the device address.
    pub address_field: String,
    /// Whether to show progress.
    pub show_progress: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            address_field: DEFAULT_ADDRESS_FIELD.to_string(),
            show_progress: true,
        }
    }
}

/// Read, parse and merge every file, in order.
///
/// All files are parsed before any merging starts, so a broken file
/// aborts the run before work is wasted on the others.
pub fn aggregate_files(files: &[ScannedFile], options: &AggregateOptions) -> Result<AggregateOutcome> {
    let mut batches = Vec::with_capacity(files.len());

    for file in files {
        debug!("Reading {} ({} bytes)", file.path.display(), file.size);
        let content = std::fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read input file: {}", file.path.display()))?;
        let records = parse_records(&file.path.display().to_string(), &content)?;
        info!("Loaded {} records from {}", records.len(), file.path.display());
        batches.push(records);
    }

    let total: usize = batches.iter().map(Vec::len).sum();
    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut aggregator = Aggregator::new(&options.address_field);
    for record in batches.iter().flatten() {
        if let Err(e) = aggregator.merge_record(record) {
            progress_bar.abandon();
            return Err(e.into());
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_and_clear();

    let outcome = aggregator.finish();
    info!(
        "Merged {} records into {} devices",
        outcome.records_processed,
        outcome.records.len()
    );

    Ok(outcome)
}
