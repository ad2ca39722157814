use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::columns::{headings, FLOW_COLUMNS};
use crate::filter::{filter, FilterCriterion};
use crate::models::ValidationResult;

pub const ERROR_EXPORT_FILE_NAME: &str = "physical_flow_errors.csv";

/// Renders the error rows of `view` as CSV.
///
/// The view is narrowed to failed rows whatever filter produced it. Each cell holds the
/// resolved value or, failing that, the validation error for the field. Fields are
/// quoted only when they contain a delimiter, quote or line break.
pub fn export_errors(view: &[ValidationResult]) -> Result<String> {
    let error_rows = filter(view, FilterCriterion::Error);

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(headings())
        .context("Failed to write CSV header")?;
    for row in &error_rows {
        let cells: Vec<String> = FLOW_COLUMNS.iter().map(|c| c.value_or_error(row)).collect();
        writer
            .write_record(&cells)
            .context("Failed to write CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    let text = String::from_utf8(bytes).context("CSV output was not valid UTF-8")?;
    info!("Rendered {} error rows for export.", error_rows.len());
    Ok(text)
}

/// Writes the error export into `dir` under the standard file name and returns its path.
pub fn write_error_file(dir: &Path, view: &[ValidationResult]) -> Result<PathBuf> {
    let text = export_errors(view)?;
    let path = dir.join(ERROR_EXPORT_FILE_NAME);
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to write error export to {:?}", path))?;
    info!("Error export saved to {:?}", path);
    Ok(path)
}
