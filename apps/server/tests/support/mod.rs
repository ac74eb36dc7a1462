//! Shared harness for router-level tests
//!
//! Requests go through the full axum router with `tower::ServiceExt::oneshot`;
//! persistence lands in an in-memory store wrapped by [`TestStore`], which counts
//! gateway calls and can be told to fail selected resources.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use mhd_gateway::{
    api::create_router,
    config::{Config, FailurePolicy},
    state::AppState,
    store::{
        InMemoryResourceStore, PersistableResource, PersistedResource, PersistenceGateway,
        UpsertKey,
    },
    Error,
};
use mhd_models::Resource;
use serde_json::{json, Value};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tower::ServiceExt;

pub const BASE: &str = "/FHIR/R4";
pub const EXTERNAL_BASE_URL: &str = "https://mhd.example.org/FHIR/R4";
pub const IDENTIFIER_SYSTEM: &str = "urn:ietf:rfc:3986";

/// In-memory store that records gateway traffic and injects failures
#[derive(Default)]
pub struct TestStore {
    pub inner: InMemoryResourceStore,
    writes: AtomicUsize,
    failing_identifiers: Mutex<Vec<String>>,
    failing_binary_data: Mutex<Vec<String>>,
    fail_binaries: Mutex<bool>,
}

impl TestStore {
    /// Number of `create_or_update` calls seen so far, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reject documents whose business identifier value is `value`.
    pub fn fail_identifier(&self, value: &str) {
        self.failing_identifiers
            .lock()
            .unwrap()
            .push(value.to_string());
    }

    pub fn fail_binaries(&self) {
        *self.fail_binaries.lock().unwrap() = true;
    }

    /// Reject only Binaries whose base64 `data` is `data`.
    pub fn fail_binary_data(&self, data: &str) {
        self.failing_binary_data
            .lock()
            .unwrap()
            .push(data.to_string());
    }

    pub async fn count(&self, resource_type: &str) -> usize {
        self.inner.count(resource_type).await
    }
}

#[async_trait]
impl PersistenceGateway for TestStore {
    async fn create_or_update(
        &self,
        resource: PersistableResource,
    ) -> mhd_gateway::Result<PersistedResource> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let rejected = match (&resource, resource.upsert_key()) {
            (PersistableResource::Binary(binary), _) => {
                *self.fail_binaries.lock().unwrap()
                    || binary.data.as_ref().is_some_and(|data| {
                        self.failing_binary_data.lock().unwrap().contains(data)
                    })
            }
            (PersistableResource::DocumentReference(_), UpsertKey::Identifier(token)) => self
                .failing_identifiers
                .lock()
                .unwrap()
                .iter()
                .any(|value| token.ends_with(value.as_str())),
            (PersistableResource::DocumentReference(_), _) => false,
        };
        if rejected {
            return Err(Error::BackendStatus {
                status: 422,
                message: format!("{} rejected by test backend", resource.resource_type()),
            });
        }

        self.inner.create_or_update(resource).await
    }

    async fn read(&self, resource_type: &str, id: &str) -> mhd_gateway::Result<Option<Resource>> {
        self.inner.read(resource_type, id).await
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> mhd_gateway::Result<Vec<Resource>> {
        self.inner.search(resource_type, params).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<TestStore>,
    router: Router,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path, body, &[]).await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/fhir+json");
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, bytes))
    }

    /// POST a bundle to `path` and parse the JSON reply.
    pub async fn post_bundle(&self, path: &str, bundle: &Value) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self
            .request(Method::POST, path, Some(to_json_body(bundle)?))
            .await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    pub async fn get_json(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self
            .request_with_extra_headers(Method::GET, path, None, &[("accept", "application/fhir+json")])
            .await?;
        Ok((status, serde_json::from_slice(&body)?))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::for_tests();
    config.fhir.base_url = EXTERNAL_BASE_URL.to_string();
    config
}

pub fn omit_failures_config() -> Config {
    let mut config = test_config();
    config.processing.failure_policy = FailurePolicy::Omit;
    config
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> Pin<Box<dyn Future<Output = anyhow::Result<()>>>>,
{
    with_test_app_with_config(test_config(), f).await
}

pub async fn with_test_app_with_config<F>(config: Config, f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> Pin<Box<dyn Future<Output = anyhow::Result<()>>>>,
{
    let store = Arc::new(TestStore::default());
    let state = AppState::with_store(config, store.clone())?;
    let router = create_router(state.clone());

    f(TestApp {
        state,
        store,
        router,
    })
    .await
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "unexpected status for {context}");
}

pub fn document_reference(identifier: &str, attachment_urls: &[&str]) -> Value {
    let content: Vec<Value> = attachment_urls
        .iter()
        .map(|url| {
            json!({
                "attachment": {
                    "contentType": "application/pdf",
                    "url": url
                }
            })
        })
        .collect();

    json!({
        "resourceType": "DocumentReference",
        "masterIdentifier": { "system": IDENTIFIER_SYSTEM, "value": identifier },
        "status": "current",
        "subject": { "reference": "Patient/9876" },
        "content": content
    })
}

pub fn binary(data: &str) -> Value {
    json!({
        "resourceType": "Binary",
        "contentType": "application/pdf",
        "data": data
    })
}

pub fn entry(full_url: &str, resource: Value) -> Value {
    json!({ "fullUrl": full_url, "resource": resource })
}

pub fn transaction_entry(full_url: &str, resource: Value) -> Value {
    let resource_type = resource["resourceType"].as_str().unwrap_or_default().to_string();
    json!({
        "fullUrl": full_url,
        "resource": resource,
        "request": { "method": "POST", "url": resource_type }
    })
}

pub fn transaction_bundle(entries: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": entries
    })
}

pub fn message_bundle(event: &str, mut entries: Vec<Value>) -> Value {
    let header = entry(
        "urn:uuid:00000000-0000-0000-0000-000000000001",
        json!({
            "resourceType": "MessageHeader",
            "eventCoding": { "system": "urn:ihe:iti:mhd:2023", "code": event },
            "source": { "endpoint": "https://client.example.org" }
        }),
    );
    entries.insert(0, header);
    json!({
        "resourceType": "Bundle",
        "type": "message",
        "entry": entries
    })
}

/// `entry[i].response.status` of a transaction-response.
pub fn entry_statuses(response: &Value) -> Vec<String> {
    response["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|e| e["response"]["status"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn entry_locations(response: &Value) -> Vec<String> {
    response["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e["response"]["location"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
