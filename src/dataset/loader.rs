//! CSV dataset loading with a synthetic fallback.

use super::{generate_sample_data, HealthRecord};
use crate::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// Read and concatenate CSV files with a header row of dataset column names.
pub fn load_dataset(paths: &[PathBuf]) -> Result<Vec<HealthRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let before = records.len();
        for row in reader.deserialize::<HealthRecord>() {
            records.push(row?);
        }
        info!(path = %path.display(), rows = records.len() - before, "dataset file loaded");
    }
    Ok(records)
}

/// Load the configured files; if none are configured or any is missing, use generated data.
pub fn load_or_generate(paths: &[PathBuf], sample_rows: usize, seed: u64) -> Result<Vec<HealthRecord>> {
    let missing: Vec<&PathBuf> = paths.iter().filter(|p| !p.exists()).collect();
    if paths.is_empty() || !missing.is_empty() {
        warn!(
            missing = ?missing,
            rows = sample_rows,
            "dataset files not found; using generated sample data"
        );
        return Ok(generate_sample_data(sample_rows, seed));
    }
    load_dataset(paths)
}
