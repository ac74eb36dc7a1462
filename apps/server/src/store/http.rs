//! FHIR REST backend store
//!
//! Forwards persistence to a FHIR server over HTTP:
//! - identifier upsert -> conditional update `PUT {base}/{type}?identifier={token}`
//! - id upsert -> `PUT {base}/{type}/{id}`
//! - content digest -> conditional create `POST {base}/{type}` with
//!   `If-None-Exist: _tag={digest token}`
//! - create -> `POST {base}/{type}`
//!
//! No retries are attempted; a failed call is reported to the caller as is.

use super::{
    content_digest_token, ParsedUrl, PersistableResource, PersistedResource, PersistenceGateway,
    UpsertKey,
};
use crate::Result;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode};
use mhd_models::{Bundle, OperationOutcome, Resource};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const FHIR_JSON: &str = "application/fhir+json";
const MAX_ERROR_BODY: usize = 512;

pub struct HttpResourceStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| {
            crate::Error::Internal(format!("Invalid backend URL '{}': {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn type_url(&self, resource_type: &str) -> String {
        format!("{}/{}", self.base_url, resource_type)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let response = request
            .header(header::ACCEPT, FHIR_JSON)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!(status = %status, bytes = body.len(), "Backend responded");

        Ok((status, headers, body.to_vec()))
    }
}

#[async_trait]
impl PersistenceGateway for HttpResourceStore {
    #[instrument(skip(self, resource), fields(resource_type = resource.resource_type()))]
    async fn create_or_update(&self, resource: PersistableResource) -> Result<PersistedResource> {
        let resource_type = resource.resource_type();
        let key = resource.upsert_key();

        let mut body = resource.into_stored_resource();
        let request = match &key {
            UpsertKey::Identifier(token) => {
                // The matched resource decides the id; a bundle-local id would conflict.
                clear_id(&mut body);
                self.client
                    .request(Method::PUT, self.type_url(resource_type))
                    .query(&[("identifier", token.as_str())])
            }
            UpsertKey::Id(id) => self
                .client
                .request(Method::PUT, format!("{}/{}", self.type_url(resource_type), id)),
            UpsertKey::ContentDigest(digest) => {
                clear_id(&mut body);
                self.client
                    .request(Method::POST, self.type_url(resource_type))
                    .header("If-None-Exist", format!("_tag={}", content_digest_token(digest)))
            }
            UpsertKey::Create => {
                clear_id(&mut body);
                self.client.request(Method::POST, self.type_url(resource_type))
            }
        };

        let request = request
            .header(header::CONTENT_TYPE, FHIR_JSON)
            .header("Prefer", "return=representation")
            .body(serde_json::to_vec(&body)?);

        let (status, headers, bytes) = self.send(request).await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        let persisted = persisted_identity(resource_type, status, &headers, &bytes)?;
        debug!(id = %persisted.id, updated = persisted.updated, "Backend assigned identity");
        Ok(persisted)
    }

    #[instrument(skip(self))]
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Resource>> {
        let request = self
            .client
            .get(format!("{}/{}", self.type_url(resource_type), id));
        let (status, _headers, bytes) = self.send(request).await?;

        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            s if s.is_success() => {
                let resource: Resource = serde_json::from_slice(&bytes).map_err(|e| {
                    crate::Error::BackendUnavailable(format!(
                        "Backend returned an unreadable {}: {}",
                        resource_type, e
                    ))
                })?;
                Ok(Some(resource))
            }
            s => Err(status_error(s, &bytes)),
        }
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Resource>> {
        let request = self.client.get(self.type_url(resource_type)).query(params);
        let (status, _headers, bytes) = self.send(request).await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        let bundle: Bundle = serde_json::from_slice(&bytes).map_err(|e| {
            crate::Error::BackendUnavailable(format!(
                "Backend returned an unreadable search result: {}",
                e
            ))
        })?;

        Ok(bundle
            .entry
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.resource)
            .filter(|resource| resource.resource_type() == resource_type)
            .collect())
    }
}

fn clear_id(resource: &mut Resource) {
    match resource {
        Resource::DocumentReference(doc) => doc.id = None,
        Resource::Binary(binary) => binary.id = None,
        Resource::MessageHeader(_) | Resource::OperationOutcome(_) | Resource::Other(_) => {}
    }
}

/// Identity from the returned representation, falling back to `Location` headers
/// when the backend answers `return=minimal`.
fn persisted_identity(
    resource_type: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<PersistedResource> {
    let from_body = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
        let id = value.get("id")?.as_str()?.to_string();
        let version_id = value
            .pointer("/meta/versionId")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some((id, version_id))
    });

    let (id, version_id) = from_body
        .or_else(|| {
            [header::LOCATION, header::CONTENT_LOCATION]
                .iter()
                .filter_map(|name| headers.get(name))
                .filter_map(|value| value.to_str().ok())
                .map(ParsedUrl::parse)
                .find_map(|parsed| Some((parsed.resource_id?, parsed.version_id)))
        })
        .ok_or_else(|| {
            crate::Error::BackendUnavailable(format!(
                "Backend stored the {} but returned no id",
                resource_type
            ))
        })?;

    Ok(PersistedResource {
        resource_type: resource_type.to_string(),
        id,
        version_id,
        updated: status == StatusCode::OK,
    })
}

fn transport_error(e: reqwest::Error) -> crate::Error {
    if e.is_timeout() {
        crate::Error::BackendUnavailable(format!("Backend request timed out: {}", e))
    } else if e.is_connect() {
        crate::Error::BackendUnavailable(format!("Failed to connect to backend: {}", e))
    } else {
        crate::Error::BackendUnavailable(format!("Backend request failed: {}", e))
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> crate::Error {
    let message = serde_json::from_slice::<OperationOutcome>(body)
        .ok()
        .and_then(|outcome| outcome.diagnostics())
        .or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty()).then(|| text.chars().take(MAX_ERROR_BODY).collect())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    warn!(status = %status, message = %message, "Backend rejected request");
    crate::Error::BackendStatus {
        status: status.as_u16(),
        message,
    }
}
