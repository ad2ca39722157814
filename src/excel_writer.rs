use anyhow::Result;
use log::info;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

use crate::columns::FLOW_COLUMNS;
use crate::filter::{filter, FilterCriterion};
use crate::models::{Outcome, Summary, ValidationResult};
use crate::review::{status, FlowStatus};

/// Writes the validated batch to a review workbook with Summary, Errors and All Flows sheets.
pub fn write_review_workbook(
    file_path: &Path,
    summary: &Summary,
    results: &[ValidationResult],
) -> Result<()> {
    info!("Initializing review workbook for file: {:?}", file_path);
    let mut workbook = Workbook::new();

    let summary_sheet = workbook.add_worksheet();
    write_summary_sheet(summary_sheet, summary)?;

    let error_rows = filter(results, FilterCriterion::Error);
    let error_sheet = workbook.add_worksheet();
    write_flow_sheet(error_sheet, "Errors", &error_rows, false)?;

    let all_sheet = workbook.add_worksheet();
    write_flow_sheet(all_sheet, "All Flows", results, true)?;

    info!("Saving review workbook...");
    workbook.save(file_path)?;
    info!("Review workbook saved successfully to {:?}", file_path);
    Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, summary: &Summary) -> Result<()> {
    sheet.set_name("Summary")?;
    sheet.set_column_width(0, 22)?;
    sheet.set_column_width(1, 12)?;

    let bold = Format::new().set_bold();
    sheet.write_string_with_format(0, 0, "Metric", &bold)?;
    sheet.write_string_with_format(0, 1, "Count", &bold)?;

    let metrics = [
        ("Total", summary.total),
        ("New Flows", summary.new_flows),
        ("Existing Flows", summary.existing_flows),
        ("Failed Flows", summary.failed_flows),
        ("Missing Entities", summary.missing_entities),
        ("Circular Flows", summary.circular_flows),
        ("Non-circular Flows", summary.non_circular_flows),
        ("Errors", summary.errors),
    ];

    let mut current_row = 1u32;
    for (metric, count) in metrics {
        sheet.write_string(current_row, 0, metric)?;
        sheet.write_number(current_row, 1, count as f64)?;
        current_row += 1;
    }

    current_row += 1;
    sheet.write_string(current_row, 0, "Generated")?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    sheet.write_string(current_row, 1, &timestamp)?;

    info!("'Summary' sheet written with {} metrics.", metrics.len());
    Ok(())
}

/// One row per flow using the review columns. With `with_status`, appends outcome and status.
fn write_flow_sheet(
    sheet: &mut Worksheet,
    name: &str,
    results: &[ValidationResult],
    with_status: bool,
) -> Result<()> {
    sheet.set_name(name)?;

    let bold = Format::new().set_bold();
    let mut headers: Vec<&str> = FLOW_COLUMNS.iter().map(|c| c.heading).collect();
    if with_status {
        headers.push("Outcome");
        headers.push("Status");
    }
    for (col_num, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col_num as u16, *header, &bold)?;
    }

    for (row_num, result) in results.iter().enumerate() {
        let current_row = (row_num + 1) as u32; // +1 for header row
        for (col_num, column) in FLOW_COLUMNS.iter().enumerate() {
            sheet.write_string(current_row, col_num as u16, column.value_or_error(result))?;
        }
        if with_status {
            let outcome = match result.outcome {
                Outcome::Success => "SUCCESS",
                Outcome::Failure => "FAILURE",
            };
            let base = FLOW_COLUMNS.len() as u16;
            sheet.write_string(current_row, base, outcome)?;
            sheet.write_string(current_row, base + 1, status_label(result))?;
        }
    }
    info!("'{}' sheet written with {} rows.", name, results.len());
    Ok(())
}

/// Same badge as the review grid, blank while the batch has parse errors.
fn status_label(result: &ValidationResult) -> String {
    status(result).as_ref().map(FlowStatus::label).unwrap_or_default()
}
