//! Input file discovery.
//!
//! Raw telemetry arrives either as explicit files or as directories full
//! of exported batches. This module expands the paths given on the
//! command line into an ordered list of record files.

use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for input discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to pick up inside directories (e.g., ["json", "jsonl"])
    pub extensions: Vec<String>,
    /// Entry names to skip while walking directories
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["json".to_string(), "jsonl".to_string()],
            excludes: Vec::new(),
            max_file_size: 512 * 1024 * 1024, // 512MB
        }
    }
}

impl From<&crate::config::AggregateConfig> for ScanConfig {
    fn from(config: &crate::config::AggregateConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Expands input paths into record files.
pub struct InputScanner {
    config: ScanConfig,
}

impl InputScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Resolve every input path, in the order given.
    ///
    /// Explicit files are always taken. Directories are walked
    /// recursively and their matches are sorted by path.
    pub fn scan(&self, inputs: &[PathBuf]) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_file() {
                files.push(ScannedFile {
                    path: input.clone(),
                    size: fs::metadata(input)?.len(),
                });
            } else if input.is_dir() {
                let found = self.walk(input)?;
                if found.is_empty() {
                    warn!("No record files found in {}", input.display());
                }
                files.extend(found);
            } else {
                return Err(anyhow!("Input not found: {}", input.display()));
            }
        }

        Ok(files)
    }

    /// Check if a file inside a directory should be read.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }

    fn walk(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry: &DirEntry| {
                entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Cannot read entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = entry.metadata()?.len();
            if size > self.config.max_file_size {
                warn!(
                    "Skipping {} ({} bytes exceeds limit of {})",
                    entry.path().display(),
                    size,
                    self.config.max_file_size
                );
                continue;
            }

            files.push(ScannedFile {
                path: entry.into_path(),
                size,
            });
        }

        Ok(files)
    }
}
