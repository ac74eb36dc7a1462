//! Bundle Processing Pipeline endpoints

use super::parse_bundle;
use crate::api::FhirJson;
use crate::{state::AppState, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// `POST [base]/$process-message`: returns an OperationOutcome.
pub async fn process_message(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let bundle = parse_bundle(&body)?;
    let report = state.processor.process_message(&bundle).await?;
    let outcome = state.synthesizer.operation_outcome(&report);

    Ok((StatusCode::OK, FhirJson(outcome)).into_response())
}

/// `POST [base]/`: returns a transaction-response Bundle.
pub async fn process_transaction(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let bundle = parse_bundle(&body)?;
    let report = state.processor.process_transaction(&bundle).await?;
    let response = state.synthesizer.transaction_response(&report);

    Ok((StatusCode::OK, FhirJson(response)).into_response())
}
