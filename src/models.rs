use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes the canonical field a source column is mapped onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub name: String,
}

impl TargetField {
    pub fn new(name: impl Into<String>) -> Self {
        TargetField { name: name.into() }
    }
}

/// Source column name -> canonical target field.
pub type ColumnMapping = BTreeMap<String, TargetField>;

/// One row of uploaded tabular data, keyed by source column name.
pub type SourceRow = BTreeMap<String, String>;

/// An uploaded row translated into canonical field names, ready for validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord(pub BTreeMap<String, String>);

impl CanonicalRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reference to an entity in the architecture catalog (application, actor, flow...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub kind: String,
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl EntityReference {
    /// Two references point at the same entity when kind and id agree; names are informational.
    pub fn same_ref(&self, other: &EntityReference) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// The backend's resolved interpretation of a canonical record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedFlow {
    pub source: Option<EntityReference>,
    pub target: Option<EntityReference>,
    pub owner: Option<EntityReference>,
    pub name: Option<String>,
    pub format: Option<String>,
    pub frequency: Option<String>,
    pub basis_offset: Option<i32>,
    pub transport: Option<String>,
    pub criticality: Option<String>,
    pub external_id: Option<String>,
    pub description: Option<String>,
    pub spec_description: Option<String>,
    pub spec_external_id: Option<String>,
}

impl ParsedFlow {
    /// True when both ends resolved to the same catalog entity.
    pub fn is_circular(&self) -> bool {
        match (&self.source, &self.target) {
            (Some(source), Some(target)) => source.same_ref(target),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

/// Per-record response from the validation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub outcome: Outcome,
    #[serde(default)]
    pub entity_reference: Option<EntityReference>,
    #[serde(default)]
    pub parsed_flow: ParsedFlow,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    // Batch-wide flag, stamped by the classifier
    #[serde(default)]
    pub has_parse_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_command: Option<CanonicalRecord>,
}

/// Aggregated counts over one validated batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub new_flows: usize,
    pub existing_flows: usize,
    pub failed_flows: usize,
    pub missing_entities: usize,
    pub circular_flows: usize,
    pub non_circular_flows: usize,
    pub errors: usize,
}

impl Summary {
    /// Existing-flow count as the original two-bucket tally reported it, with failed rows folded in.
    pub fn legacy_existing_flows(&self) -> usize {
        self.existing_flows + self.failed_flows
    }
}
