//! Document read surface

use crate::api::FhirJson;
use crate::services::documents::binary_content;
use crate::{state::AppState, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// `GET [base]/DocumentReference/:id`
pub async fn read_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let document = state.documents.read_document(&id).await?;
    Ok((StatusCode::OK, FhirJson(document)).into_response())
}

/// `GET [base]/DocumentReference?patient=&date=&identifier=&_id=`
pub async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let bundle = state.documents.search_documents(&params).await?;
    Ok((StatusCode::OK, FhirJson(bundle)).into_response())
}

/// `GET [base]/Binary/:id`
///
/// FHIR JSON when the client asks for it, otherwise the decoded content with the
/// Binary's own content type.
pub async fn read_binary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let binary = state.documents.read_binary(&id).await?;

    if wants_json(&headers) {
        return Ok((StatusCode::OK, FhirJson(binary)).into_response());
    }

    let content = binary_content(&binary)?;
    let content_type = binary
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], content).into_response())
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| {
            accept.split(',').any(|media| {
                let media = media.split(';').next().unwrap_or("").trim();
                media.eq_ignore_ascii_case("application/fhir+json")
                    || media.eq_ignore_ascii_case("application/json")
            })
        })
        .unwrap_or(false)
}
