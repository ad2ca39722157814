//! Shared fixtures: an in-memory validation gateway backed by a tiny application catalog.
#![allow(dead_code)]

use anyhow::Result;
use futures::future::BoxFuture;
use physical_flow_upload::gateway::ValidationGateway;
use physical_flow_upload::models::{CanonicalRecord, EntityReference, Outcome, ParsedFlow, ValidationResult};
use std::collections::BTreeMap;

pub const UPLOAD_CSV: &str = "\
Source App,Target App,Flow Name,Format,Frequency,Basis Offset,External Id
Payments,Ledger,positions,FLAT_FILE,DAILY,0,PF-1
Payments,Ledger,settlements,FLAT_FILE,DAILY,1,
Ledger,Ledger,self feed,JSON,MONTHLY,0,
Unknown System,Ledger,orphan feed,XML,WEEKLY,0,
";

pub fn app(id: i64, name: &str) -> EntityReference {
    EntityReference {
        kind: "APPLICATION".to_string(),
        id,
        name: Some(name.to_string()),
        external_id: None,
    }
}

/// Resolves application names against a fixed catalog. Flows whose external id is
/// already registered come back with an entity reference.
pub struct CatalogGateway {
    applications: Vec<EntityReference>,
    existing_external_ids: Vec<String>,
}

impl CatalogGateway {
    pub fn new() -> Self {
        CatalogGateway {
            applications: vec![app(1, "Payments"), app(2, "Ledger")],
            existing_external_ids: vec!["PF-1".to_string()],
        }
    }

    fn resolve(&self, name: Option<&str>) -> Option<EntityReference> {
        let name = name?;
        self.applications
            .iter()
            .find(|a| a.name.as_deref().map_or(false, |n| n.eq_ignore_ascii_case(name)))
            .cloned()
    }

    fn validate_one(&self, record: &CanonicalRecord) -> ValidationResult {
        let mut errors = BTreeMap::new();
        let source = self.resolve(record.get("source"));
        let target = self.resolve(record.get("target"));
        let owner = self.resolve(record.get("owner"));
        if source.is_none() {
            errors.insert("source".to_string(), format!("{} not found", record.get("source").unwrap_or("")));
        }
        if target.is_none() {
            errors.insert("target".to_string(), format!("{} not found", record.get("target").unwrap_or("")));
        }
        if owner.is_none() {
            errors.insert("owner".to_string(), "owner not found".to_string());
        }

        let external_id = record.get("externalId").filter(|e| !e.is_empty()).map(str::to_owned);
        let entity_reference = external_id
            .as_ref()
            .filter(|e| self.existing_external_ids.contains(e))
            .map(|_| EntityReference {
                kind: "PHYSICAL_FLOW".to_string(),
                id: 500,
                name: None,
                external_id: external_id.clone(),
            });

        let parsed_flow = ParsedFlow {
            source,
            target,
            owner,
            name: record.get("name").map(str::to_owned),
            format: record.get("format").map(str::to_owned),
            frequency: record.get("frequency").map(str::to_owned),
            basis_offset: record.get("basisOffset").and_then(|b| b.parse().ok()),
            external_id,
            description: record.get("description").map(str::to_owned),
            ..Default::default()
        };

        ValidationResult {
            outcome: if errors.is_empty() { Outcome::Success } else { Outcome::Failure },
            entity_reference,
            parsed_flow,
            errors,
            has_parse_errors: false,
            original_command: Some(record.clone()),
        }
    }
}

impl ValidationGateway for CatalogGateway {
    fn validate<'a>(&'a self, records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
        Box::pin(async move { Ok(records.iter().map(|r| self.validate_one(r)).collect()) })
    }
}
