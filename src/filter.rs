use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::classifier::FlowCategory;
use crate::models::ValidationResult;

/// Which rows of a validated batch are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterCriterion {
    #[default]
    All,
    Error,
    New,
    Existing,
}

impl FilterCriterion {
    pub fn matches(self, result: &ValidationResult) -> bool {
        let category = FlowCategory::of(result);
        match self {
            FilterCriterion::All => true,
            FilterCriterion::Error => category == FlowCategory::Failed,
            FilterCriterion::New => category == FlowCategory::New,
            FilterCriterion::Existing => category == FlowCategory::Existing,
        }
    }
}

// Unrecognised criteria fall back to showing everything.
impl FromStr for FilterCriterion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => FilterCriterion::Error,
            "NEW" => FilterCriterion::New,
            "EXISTING" => FilterCriterion::Existing,
            _ => FilterCriterion::All,
        })
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterCriterion::All => "ALL",
            FilterCriterion::Error => "ERROR",
            FilterCriterion::New => "NEW",
            FilterCriterion::Existing => "EXISTING",
        };
        f.write_str(label)
    }
}

/// Returns a fresh view of the rows matching `criterion`; the input is left untouched.
pub fn filter(results: &[ValidationResult], criterion: FilterCriterion) -> Vec<ValidationResult> {
    results
        .iter()
        .filter(|r| criterion.matches(r))
        .cloned()
        .collect()
}
