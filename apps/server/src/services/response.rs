//! Response Synthesizer
//!
//! Turns a [`ProcessingReport`] into what the client receives: an OperationOutcome
//! for message bundles, a `transaction-response` Bundle for transactions. Output
//! order always follows the order of the focal resources in the request.

use super::processor::{OutcomeResult, ProcessingOutcome, ProcessingReport};
use crate::config::FailurePolicy;
use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use mhd_models::{
    Bundle, BundleEntry, BundleEntryResponse, BundleType, IssueSeverity, IssueType,
    OperationOutcome, OperationOutcomeIssue, Resource,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSynthesizer {
    failure_policy: FailurePolicy,
}

impl ResponseSynthesizer {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self { failure_policy }
    }

    fn reports_failures(&self) -> bool {
        match self.failure_policy {
            FailurePolicy::Report => true,
            FailurePolicy::Omit => false,
        }
    }

    /// One informational issue per persisted resource, carrying its location.
    ///
    /// An empty report produces an outcome with no issues.
    pub fn operation_outcome(&self, report: &ProcessingReport) -> OperationOutcome {
        let mut outcome = OperationOutcome::default();

        for processed in &report.outcomes {
            match &processed.result {
                OutcomeResult::Persisted(persisted) => {
                    outcome.issue.push(
                        OperationOutcomeIssue::new(IssueSeverity::Information, IssueType::Informational)
                            .location(persisted.location()),
                    );
                }
                OutcomeResult::Failed { status, message } => {
                    if self.reports_failures() {
                        outcome.issue.push(failure_issue(processed, *status, message));
                    }
                }
            }

            if self.reports_failures() {
                outcome
                    .issue
                    .extend(attachment_warnings(processed, &entry_expression(processed)));
            }
        }

        outcome
    }

    /// One response entry per focal resource attempted, `200 OK` with a location
    /// on success.
    pub fn transaction_response(&self, report: &ProcessingReport) -> Bundle {
        let mut bundle = Bundle::new(BundleType::TransactionResponse);
        bundle.id = Some(Uuid::new_v4().to_string());
        bundle.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        for processed in &report.outcomes {
            let response = match &processed.result {
                OutcomeResult::Persisted(persisted) => {
                    let mut response = BundleEntryResponse::new(status_line(StatusCode::OK));
                    response.location = Some(persisted.location());
                    response.etag = persisted
                        .version_id
                        .as_ref()
                        .map(|v| format!("W/\"{}\"", v));

                    let warnings = if self.reports_failures() {
                        attachment_warnings(processed, "Bundle.entry.resource")
                    } else {
                        Vec::new()
                    };
                    if !warnings.is_empty() {
                        response.outcome = Some(Resource::OperationOutcome(OperationOutcome {
                            issue: warnings,
                            ..Default::default()
                        }));
                    }
                    response
                }
                OutcomeResult::Failed { status, message } => {
                    if !self.reports_failures() {
                        continue;
                    }
                    let mut response = BundleEntryResponse::new(status_line(*status));
                    response.outcome = Some(Resource::OperationOutcome(
                        OperationOutcome::with_issue(failure_issue(processed, *status, message)),
                    ));
                    response
                }
            };

            bundle.push_entry(BundleEntry::with_response(response));
        }

        bundle
    }
}

fn entry_expression(processed: &ProcessingOutcome) -> String {
    format!("Bundle.entry[{}].resource", processed.entry_index)
}

fn failure_issue(processed: &ProcessingOutcome, status: StatusCode, message: &str) -> OperationOutcomeIssue {
    let subject = processed
        .full_url
        .as_deref()
        .unwrap_or(processed.resource_type.as_str());

    OperationOutcomeIssue::new(IssueSeverity::Error, issue_type_for_status(status))
        .diagnostics(format!("{} was not persisted: {}", subject, message))
        .expression(entry_expression(processed))
}

fn attachment_warnings(processed: &ProcessingOutcome, resource_expression: &str) -> Vec<OperationOutcomeIssue> {
    processed
        .attachment_failures
        .iter()
        .map(|failure| {
            OperationOutcomeIssue::new(IssueSeverity::Warning, IssueType::Incomplete)
                .diagnostics(format!(
                    "Attachment '{}' was not relocated: {}",
                    failure.reference, failure.message
                ))
                .expression(format!(
                    "{}.content[{}].attachment.url",
                    resource_expression, failure.content_index
                ))
        })
        .collect()
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

fn issue_type_for_status(status: StatusCode) -> IssueType {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => IssueType::Invalid,
        StatusCode::NOT_FOUND | StatusCode::GONE => IssueType::NotFound,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => IssueType::Conflict,
        StatusCode::UNAUTHORIZED => IssueType::Login,
        StatusCode::FORBIDDEN => IssueType::Forbidden,
        StatusCode::NOT_IMPLEMENTED => IssueType::NotSupported,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => IssueType::Transient,
        StatusCode::GATEWAY_TIMEOUT => IssueType::Timeout,
        _ => IssueType::Exception,
    }
}
