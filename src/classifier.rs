use log::{debug, info};

use crate::models::{Outcome, Summary, ValidationResult};

/// The bucket a single validated row falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCategory {
    New,
    Existing,
    Failed,
}

impl FlowCategory {
    pub fn of(result: &ValidationResult) -> Self {
        match (result.outcome, &result.entity_reference) {
            (Outcome::Failure, _) => FlowCategory::Failed,
            (Outcome::Success, None) => FlowCategory::New,
            (Outcome::Success, Some(_)) => FlowCategory::Existing,
        }
    }
}

/// Output of [`classify`]: the batch with its `has_parse_errors` flag stamped, plus counts.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub annotated: Vec<ValidationResult>,
    pub summary: Summary,
}

/// Number of field errors across the batch. `owner` errors are not counted: an
/// unresolved owner is reported but does not block the upload.
pub fn parse_error_count(results: &[ValidationResult]) -> usize {
    results
        .iter()
        .map(|r| r.errors.keys().filter(|k| k.as_str() != "owner").count())
        .sum()
}

/// A batch is complete when no blocking field errors remain.
pub fn is_complete(results: &[ValidationResult]) -> bool {
    parse_error_count(results) == 0
}

pub fn summarise(results: &[ValidationResult]) -> Summary {
    let mut summary = Summary {
        total: results.len(),
        missing_entities: parse_error_count(results),
        ..Default::default()
    };

    for result in results {
        match FlowCategory::of(result) {
            FlowCategory::New => summary.new_flows += 1,
            FlowCategory::Existing => summary.existing_flows += 1,
            FlowCategory::Failed => summary.failed_flows += 1,
        }
        if result.parsed_flow.is_circular() {
            summary.circular_flows += 1;
        }
    }

    summary.non_circular_flows = summary.total - summary.circular_flows;
    summary.errors = summary.missing_entities + summary.circular_flows;
    summary
}

/// Stamps the batch-wide parse error flag onto every row and recomputes the summary.
pub fn classify(results: Vec<ValidationResult>) -> Classification {
    let has_parse_errors = results.iter().any(|r| r.outcome == Outcome::Failure);
    debug!("Batch of {} results has parse errors: {}", results.len(), has_parse_errors);

    let annotated: Vec<ValidationResult> = results
        .into_iter()
        .map(|mut r| {
            r.has_parse_errors = has_parse_errors;
            r
        })
        .collect();

    let summary = summarise(&annotated);
    info!(
        "Classified {} flows: {} new, {} existing, {} failed, {} circular, {} errors.",
        summary.total,
        summary.new_flows,
        summary.existing_flows,
        summary.failed_flows,
        summary.circular_flows,
        summary.errors
    );

    Classification { annotated, summary }
}
