use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::{CanonicalRecord, ColumnMapping, SourceRow, TargetField};

/// Minimum Jaro-Winkler similarity for a header to be suggested as a mapping.
pub const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Canonical fields accepted by the validation endpoint, each with the header spellings
/// commonly seen in upload spreadsheets.
pub const TARGET_FIELDS: &[(&str, &[&str])] = &[
    ("source", &["source", "sourceapp", "sourceapplication", "sourcesystem", "from"]),
    ("target", &["target", "targetapp", "targetapplication", "targetsystem", "to"]),
    ("owner", &["owner", "owningapplication", "specowner"]),
    ("name", &["name", "flowname", "specname", "specification"]),
    ("description", &["description", "flowdescription"]),
    ("format", &["format", "dataformat"]),
    ("frequency", &["frequency", "freq"]),
    ("basisOffset", &["basisoffset", "offset"]),
    ("transport", &["transport", "transportkind"]),
    ("criticality", &["criticality"]),
    ("externalId", &["externalid", "flowexternalid", "extid"]),
    ("specDescription", &["specdescription", "specificationdescription"]),
    ("specExternalId", &["specexternalid", "specificationexternalid"]),
];

/// Applies `mapping` to every source row, producing canonical records in input order.
///
/// Source columns not named in the mapping are dropped; mapped columns missing from a
/// row leave the target field absent. `owner` falls back to `source` and `description`
/// to the empty string.
pub fn map_columns(mapping: &ColumnMapping, rows: &[SourceRow]) -> Vec<CanonicalRecord> {
    let records: Vec<CanonicalRecord> = rows
        .iter()
        .map(|row| {
            let mut record = CanonicalRecord::default();
            for (source_column, target) in mapping {
                if let Some(value) = row.get(source_column) {
                    record.insert(target.name.clone(), value.clone());
                }
            }
            apply_defaults(&mut record);
            record
        })
        .collect();
    debug!(
        "Mapped {} source rows through {} column mappings.",
        records.len(),
        mapping.len()
    );
    records
}

fn apply_defaults(record: &mut CanonicalRecord) {
    let owner_missing = record.get("owner").map_or(true, str::is_empty);
    if owner_missing {
        if let Some(source) = record.get("source").map(str::to_owned) {
            record.insert("owner", source);
        }
    }
    if record.get("description").map_or(true, str::is_empty) {
        record.insert("description", "");
    }
}

fn normalise_header(header: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static pattern"));
    re.replace_all(&header.to_lowercase(), "").into_owned()
}

/// Every target field a header resembles closely enough, with its best alias score.
fn field_matches(header: &str) -> Vec<(&'static str, f64)> {
    let normalised = normalise_header(header);
    if normalised.is_empty() {
        return Vec::new();
    }
    TARGET_FIELDS
        .iter()
        .filter_map(|(field, aliases)| {
            aliases
                .iter()
                .map(|alias| strsim::jaro_winkler(&normalised, alias))
                .max_by(f64::total_cmp)
                .filter(|score| *score >= SUGGESTION_THRESHOLD)
                .map(|score| (*field, score))
        })
        .collect()
}

/// Suggests a column mapping for an uploaded header row.
///
/// Each header maps to at most one field and each target field is claimed by at most
/// one header. Pairs are taken best score first, ties broken by header order, so a
/// header whose closest field is already taken falls back to its next closest one.
/// Headers with no convincing match are left unmapped.
pub fn suggest_mapping(headers: &[String]) -> ColumnMapping {
    let mut candidates: Vec<(usize, &String, &'static str, f64)> = headers
        .iter()
        .enumerate()
        .flat_map(|(idx, header)| {
            field_matches(header)
                .into_iter()
                .map(move |(field, score)| (idx, header, field, score))
        })
        .collect();

    candidates.sort_by(|a, b| b.3.total_cmp(&a.3).then(a.0.cmp(&b.0)));

    let mut claimed: HashSet<&'static str> = HashSet::new();
    let mut mapping = ColumnMapping::new();
    for (_, header, field, score) in candidates {
        if mapping.contains_key(header) {
            continue;
        }
        if claimed.contains(field) {
            debug!("Header '{}' also matched '{}' ({:.2}) but it is already taken.", header, field, score);
            continue;
        }
        claimed.insert(field);
        debug!("Suggesting '{}' -> '{}' (similarity {:.2})", header, field, score);
        mapping.insert(header.clone(), TargetField::new(field));
    }

    info!("Suggested mappings for {} of {} headers.", mapping.len(), headers.len());
    mapping
}
