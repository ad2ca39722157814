use crate::models::{EntityReference, ValidationResult};

/// A reviewable field of a physical flow: heading, path into the parsed flow, and
/// the key its validation error is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub heading: &'static str,
    pub path: &'static str,
    pub error_key: &'static str,
    pub entity_link: bool,
}

const fn column(heading: &'static str, path: &'static str, error_key: &'static str) -> ColumnDef {
    ColumnDef { heading, path, error_key, entity_link: false }
}

const fn entity_column(heading: &'static str, path: &'static str, error_key: &'static str) -> ColumnDef {
    ColumnDef { heading, path, error_key, entity_link: true }
}

pub const FLOW_COLUMNS: [ColumnDef; 9] = [
    entity_column("Source", "source.name", "source"),
    entity_column("Target", "target.name", "target"),
    column("Name", "name", "name"),
    column("Format", "format", "format"),
    column("Frequency", "frequency", "frequency"),
    column("Basis Offset", "basisOffset", "basisOffset"),
    column("Transport", "transport", "transport"),
    column("Criticality", "criticality", "criticality"),
    column("External ID", "externalId", "externalId"),
];

impl ColumnDef {
    /// Entity behind a linked column, when it resolved.
    pub fn entity<'a>(&self, result: &'a ValidationResult) -> Option<&'a EntityReference> {
        let flow = &result.parsed_flow;
        match self.error_key {
            "source" => flow.source.as_ref(),
            "target" => flow.target.as_ref(),
            _ => None,
        }
    }

    /// Resolved value at this column's path. Empty strings count as absent.
    pub fn resolved_value(&self, result: &ValidationResult) -> Option<String> {
        let flow = &result.parsed_flow;
        let value = match self.path {
            "source.name" => flow.source.as_ref().and_then(|e| e.name.clone()),
            "target.name" => flow.target.as_ref().and_then(|e| e.name.clone()),
            "name" => flow.name.clone(),
            "format" => flow.format.clone(),
            "frequency" => flow.frequency.clone(),
            // 0 is a real offset and is shown, not replaced by the error
            "basisOffset" => flow.basis_offset.map(|o| o.to_string()),
            "transport" => flow.transport.clone(),
            "criticality" => flow.criticality.clone(),
            "externalId" => flow.external_id.clone(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }

    pub fn error<'a>(&self, result: &'a ValidationResult) -> Option<&'a str> {
        result
            .errors
            .get(self.error_key)
            .map(String::as_str)
            .filter(|e| !e.is_empty())
    }

    /// The resolved value, falling back to the field's error message.
    pub fn value_or_error(&self, result: &ValidationResult) -> String {
        self.resolved_value(result)
            .or_else(|| self.error(result).map(str::to_owned))
            .unwrap_or_default()
    }
}

pub fn headings() -> Vec<&'static str> {
    FLOW_COLUMNS.iter().map(|c| c.heading).collect()
}
