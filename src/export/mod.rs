//! CSV output: one review file and one error report per run

pub mod rows;

pub use rows::build_rows;

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{ErrorRecord, Record, COLUMNS};

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Appends batches to run-scoped CSV files under one output directory
pub struct CsvExporter {
    output_dir: PathBuf,
    session: String,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_timestamp(output_dir, Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    /// Exporter whose file names carry `session` instead of the current time
    pub fn with_timestamp(output_dir: impl Into<PathBuf>, session: impl Into<String>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
        Ok(Self {
            output_dir,
            session: session.into(),
        })
    }

    pub fn rows_path(&self) -> PathBuf {
        self.output_dir.join(format!("gmaps_scrape_{}.csv", self.session))
    }

    pub fn errors_path(&self) -> PathBuf {
        self.output_dir.join(format!("error_report_{}.csv", self.session))
    }

    /// Append `records` to the run's review file.
    ///
    /// The header lists the export columns present in the batch, in export
    /// order, and is written only when the file is created. An empty batch
    /// writes nothing.
    pub fn export_rows(&self, records: &[Record]) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            warn!("No data to export.");
            return Ok(None);
        }

        let header: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|column| records.iter().any(|r| r.contains_key(column)))
            .collect();

        let path = self.rows_path();
        let (file, created) = open_append(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if created {
            writer.write_record(&header)?;
        }
        for record in records {
            writer.write_record(
                header
                    .iter()
                    .map(|column| record.get(column).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Exported {} rows to {}", records.len(), path.display());
        Ok(Some(path))
    }

    /// Write the run's failures, skipped entirely when there are none.
    pub fn export_errors(&self, errors: &[ErrorRecord]) -> Result<Option<PathBuf>> {
        if errors.is_empty() {
            return Ok(None);
        }

        let path = self.errors_path();
        let (file, created) = open_append(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(created).from_writer(file);
        for error in errors {
            writer.serialize(error)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Error report saved to {}", path.display());
        Ok(Some(path))
    }
}

/// Open `path` for appending; a newly created file starts with a UTF-8 BOM.
fn open_append(path: &Path) -> Result<(File, bool)> {
    let created = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if created {
        file.write_all(BOM)?;
    }
    Ok((file, created))
}
