//! OperationOutcome - processing results and errors

use crate::common::complex::CodeableConcept;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// May be empty: an outcome with no issues reports that nothing was done.
    #[serde(default)]
    pub issue: Vec<OperationOutcomeIssue>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "OperationOutcome".to_string()
}

impl Default for OperationOutcome {
    fn default() -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            issue: Vec::new(),
            extensions: HashMap::new(),
        }
    }
}

impl OperationOutcome {
    pub fn with_issue(issue: OperationOutcomeIssue) -> Self {
        Self {
            issue: vec![issue],
            ..Default::default()
        }
    }

    /// Diagnostics of all issues, joined for logging.
    pub fn diagnostics(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .issue
            .iter()
            .filter_map(|i| {
                i.diagnostics
                    .as_deref()
                    .or_else(|| i.details.as_ref().and_then(|d| d.text.as_deref()))
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,

    pub code: IssueType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Vec<String>>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl OperationOutcomeIssue {
    pub fn new(severity: IssueSeverity, code: IssueType) -> Self {
        Self {
            severity,
            code,
            details: None,
            diagnostics: None,
            location: None,
            expression: None,
            extensions: HashMap::new(),
        }
    }

    pub fn diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location.get_or_insert_with(Vec::new).push(location.into());
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression
            .get_or_insert_with(Vec::new)
            .push(expression.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Subset of the FHIR issue-type value set used by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    Security,
    Login,
    Forbidden,
    Processing,
    NotSupported,
    NotFound,
    Conflict,
    Incomplete,
    Exception,
    Timeout,
    Transient,
    Informational,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn informational_issue_shape() {
        let outcome = OperationOutcome::with_issue(
            OperationOutcomeIssue::new(IssueSeverity::Information, IssueType::Informational)
                .location("DocumentReference/123"),
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "resourceType": "OperationOutcome",
                "issue": [{
                    "severity": "information",
                    "code": "informational",
                    "location": ["DocumentReference/123"]
                }]
            })
        );
    }

    #[test]
    fn empty_outcome_serializes_empty_issue_list() {
        let value = serde_json::to_value(OperationOutcome::default()).unwrap();
        assert_eq!(value["issue"], json!([]));
    }

    #[test]
    fn unknown_issue_codes_parse() {
        let outcome: OperationOutcome = serde_json::from_value(json!({
            "resourceType": "OperationOutcome",
            "issue": [{ "severity": "error", "code": "multiple-matches", "diagnostics": "two hits" }]
        }))
        .unwrap();
        assert_eq!(outcome.issue[0].code, IssueType::Unknown);
        assert_eq!(outcome.diagnostics().as_deref(), Some("two hits"));
    }
}
