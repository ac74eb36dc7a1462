//! Error type shared by the gateway services and handlers
//!
//! Every error renders as a FHIR OperationOutcome with a matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mhd_models::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: wrong bundle type, missing root structure, unparsable body.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Resource not found: {resource_type}/{id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    BackendStatus { status: u16, message: String },

    /// The backend could not be reached, timed out, or sent an unreadable reply.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidResource(_) => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::BackendStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn issue_type(&self) -> IssueType {
        match self {
            Self::InvalidResource(_) => IssueType::Invalid,
            Self::ResourceNotFound { .. } => IssueType::NotFound,
            Self::NotSupported(_) => IssueType::NotSupported,
            Self::BackendStatus { status, .. } => match *status {
                404 | 410 => IssueType::NotFound,
                409 | 412 => IssueType::Conflict,
                400 | 422 => IssueType::Invalid,
                401 => IssueType::Login,
                403 => IssueType::Forbidden,
                _ => IssueType::Exception,
            },
            Self::BackendUnavailable(_) => IssueType::Transient,
            Self::Serialization(_) | Self::Internal(_) => IssueType::Exception,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        OperationOutcome::with_issue(
            OperationOutcomeIssue::new(IssueSeverity::Error, self.issue_type())
                .diagnostics(self.to_string()),
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, crate::api::FhirJson(self.to_operation_outcome())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_resource_is_bad_request() {
        let err = Error::InvalidResource("no MessageHeader".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let outcome = err.to_operation_outcome();
        assert_eq!(outcome.issue.len(), 1);
        assert_eq!(outcome.issue[0].severity, IssueSeverity::Error);
        assert_eq!(outcome.issue[0].code, IssueType::Invalid);
        assert!(outcome.issue[0]
            .diagnostics
            .as_deref()
            .unwrap()
            .contains("no MessageHeader"));
    }

    #[test]
    fn backend_status_is_passed_through() {
        let err = Error::BackendStatus {
            status: 412,
            message: "multiple matches".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(err.issue_type(), IssueType::Conflict);
    }

    #[test]
    fn unreachable_backend_is_bad_gateway() {
        let err = Error::BackendUnavailable("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.issue_type(), IssueType::Transient);
    }
}
