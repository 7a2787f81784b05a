//! Place names to scrape

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Read the names in `column` of the CSV at `path`, skipping blank cells.
pub fn load_places(path: &Path, column: &str, max: Option<usize>) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        .ok_or_else(|| anyhow!("Column '{}' not found in {}", column, path.display()))?;

    let mut names = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        if let Some(name) = row.get(index).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }
    Ok(limit(names, max))
}

/// Keep at most `max` names, in input order.
pub fn limit(mut names: Vec<String>, max: Option<usize>) -> Vec<String> {
    if let Some(max) = max {
        names.truncate(max);
    }
    names
}
