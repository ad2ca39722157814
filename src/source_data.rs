use anyhow::{Context, Result};
use log::{info, warn};
use std::io::Read;
use std::path::Path;

use crate::models::{ColumnMapping, SourceRow};

/// An uploaded spreadsheet: its header row and the data rows keyed by header.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

/// Reads comma separated upload data. Blank headers are skipped; short rows leave
/// trailing columns absent.
pub fn read_source_data<R: Read>(reader: R) -> Result<SourceData> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read upload header row")?
        .iter()
        .map(str::to_owned)
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read upload row {}", idx + 2))?;
        if record.iter().all(str::is_empty) {
            warn!("Skipping blank upload row {}", idx + 2);
            continue;
        }
        let row: SourceRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), value.to_owned()))
            .collect();
        rows.push(row);
    }

    info!("Read {} upload rows with {} columns.", rows.len(), headers.len());
    Ok(SourceData { headers, rows })
}

pub fn read_source_file(path: &Path) -> Result<SourceData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open upload file {:?}", path))?;
    read_source_data(file)
}

/// Loads a column mapping saved as JSON: `{"Source column": {"name": "source"}, ...}`.
pub fn read_mapping_file(path: &Path) -> Result<ColumnMapping> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read mapping file {:?}", path))?;
    let mapping: ColumnMapping = serde_json::from_str(&content)
        .with_context(|| format!("Mapping file {:?} is not a valid column mapping", path))?;
    info!("Loaded {} column mappings from {:?}", mapping.len(), path);
    Ok(mapping)
}
