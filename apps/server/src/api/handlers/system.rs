//! Conformance and operational endpoints

use crate::api::FhirJson;
use crate::{metrics, state::AppState, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `GET [base]/metadata`
pub async fn capability_statement(State(state): State<AppState>) -> Response {
    (StatusCode::OK, FhirJson(state.capability.statement())).into_response()
}

pub async fn health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.config.backend.kind,
        })),
    )
        .into_response()
}

/// Prometheus text exposition.
pub async fn metrics() -> Result<Response> {
    let body = metrics::render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
