//! CapabilityStatement for `GET [base]/metadata`

use super::documents::DOCUMENT_SEARCH_PARAMS;
use crate::config::Config;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

/// Builds the CapabilityStatement once; it only depends on configuration.
pub struct CapabilityService {
    statement: Value,
}

impl CapabilityService {
    pub fn new(config: &Config) -> Self {
        Self {
            statement: build_capability_statement(config),
        }
    }

    pub fn statement(&self) -> &Value {
        &self.statement
    }
}

fn build_capability_statement(config: &Config) -> Value {
    let cs = &config.fhir.capability_statement;

    let search_params: Vec<Value> = DOCUMENT_SEARCH_PARAMS
        .iter()
        .map(|name| {
            let param_type = match *name {
                "patient" => "reference",
                "date" => "date",
                _ => "token",
            };
            json!({ "name": name, "type": param_type })
        })
        .collect();

    json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "date": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "name": cs.name,
        "publisher": cs.publisher,
        "kind": "instance",
        "software": {
            "name": cs.software_name,
            "version": cs.software_version
        },
        "implementation": {
            "description": cs.name,
            "url": config.fhir.base_url
        },
        "fhirVersion": config.fhir.version,
        "format": ["application/fhir+json", "json"],
        "rest": [{
            "mode": "server",
            "resource": [
                {
                    "type": "DocumentReference",
                    "interaction": [{ "code": "read" }, { "code": "search-type" }],
                    "searchParam": search_params
                },
                {
                    "type": "Binary",
                    "interaction": [{ "code": "read" }]
                }
            ],
            "interaction": [{ "code": "transaction" }],
            "operation": [{
                "name": "process-message",
                "definition": "http://hl7.org/fhir/OperationDefinition/MessageHeader-process-message"
            }]
        }]
    })
}
