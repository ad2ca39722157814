use crate::columns::{ColumnDef, FLOW_COLUMNS};
use crate::models::{EntityReference, ValidationResult};

/// Badge shown in the trailing status column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    New,
    /// Links to the existing physical flow by id.
    Exists(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCell {
    pub value: Option<String>,
    pub link: Option<EntityReference>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub cells: Vec<ReviewCell>,
    /// Hidden while any row in the batch failed to parse.
    pub status: Option<FlowStatus>,
}

fn cell(column: &ColumnDef, result: &ValidationResult) -> ReviewCell {
    ReviewCell {
        value: column.resolved_value(result),
        link: if column.entity_link { column.entity(result).cloned() } else { None },
        error: column.error(result).map(str::to_owned),
    }
}

pub(crate) fn status(result: &ValidationResult) -> Option<FlowStatus> {
    if result.has_parse_errors {
        return None;
    }
    Some(match &result.entity_reference {
        None => FlowStatus::New,
        Some(existing) => FlowStatus::Exists(existing.id),
    })
}

/// Builds the grid model for a view of validated results.
pub fn review_rows(results: &[ValidationResult]) -> Vec<ReviewRow> {
    results
        .iter()
        .map(|r| ReviewRow {
            cells: FLOW_COLUMNS.iter().map(|c| cell(c, r)).collect(),
            status: status(r),
        })
        .collect()
}

impl ReviewCell {
    fn display(&self) -> String {
        match (&self.value, &self.error) {
            (Some(v), Some(e)) => format!("{} !{}", v, e),
            (Some(v), None) => v.clone(),
            (None, Some(e)) => format!("!{}", e),
            (None, None) => String::new(),
        }
    }
}

impl FlowStatus {
    pub(crate) fn label(&self) -> String {
        match self {
            FlowStatus::New => "New".to_string(),
            FlowStatus::Exists(id) => format!("Exists #{}", id),
        }
    }
}

/// Renders rows as an aligned plain-text table. Errors are prefixed with `!`.
pub fn render_table(rows: &[ReviewRow]) -> String {
    let mut table: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
    let mut header: Vec<String> = FLOW_COLUMNS.iter().map(|c| c.heading.to_string()).collect();
    header.push("Status".to_string());
    table.push(header);

    for row in rows {
        let mut line: Vec<String> = row.cells.iter().map(ReviewCell::display).collect();
        line.push(row.status.as_ref().map(FlowStatus::label).unwrap_or_default());
        table.push(line);
    }

    let widths: Vec<usize> = (0..table[0].len())
        .map(|col| table.iter().map(|line| line[col].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for line in &table {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{:<width$}", text, width = *width))
            .collect();
        out.push_str(padded.join(" | ").trim_end());
        out.push('\n');
    }
    out
}
