//! Read surface for stored documents and their content
//!
//! Reads and searches are passed through to the Persistence Gateway. Only the
//! document search parameters the gateway advertises are forwarded.

use crate::store::PersistenceGateway;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mhd_models::{Binary, Bundle, BundleEntry, BundleType, DocumentReference, Resource};
use serde_json::json;
use std::sync::Arc;

/// DocumentReference search parameters passed on to the backend.
pub const DOCUMENT_SEARCH_PARAMS: [&str; 4] = ["patient", "date", "identifier", "_id"];

pub struct DocumentService {
    gateway: Arc<dyn PersistenceGateway>,
    base_url: String,
}

impl DocumentService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, base_url: &str) -> Self {
        Self {
            gateway,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn read_document(&self, id: &str) -> Result<DocumentReference> {
        check_id(id)?;
        match self.gateway.read("DocumentReference", id).await? {
            Some(Resource::DocumentReference(document)) => Ok(document),
            _ => Err(not_found("DocumentReference", id)),
        }
    }

    pub async fn read_binary(&self, id: &str) -> Result<Binary> {
        check_id(id)?;
        match self.gateway.read("Binary", id).await? {
            Some(Resource::Binary(binary)) => Ok(binary),
            _ => Err(not_found("Binary", id)),
        }
    }

    /// Search documents and wrap the matches in a `searchset` Bundle.
    pub async fn search_documents(&self, params: &[(String, String)]) -> Result<Bundle> {
        let forwarded: Vec<(String, String)> = params
            .iter()
            .filter(|(name, _)| DOCUMENT_SEARCH_PARAMS.contains(&name.as_str()))
            .cloned()
            .collect();
        if forwarded.len() < params.len() {
            tracing::debug!(
                dropped = params.len() - forwarded.len(),
                "Ignoring unsupported DocumentReference search parameters"
            );
        }

        let matches = self.gateway.search("DocumentReference", &forwarded).await?;

        let mut bundle = Bundle::new(BundleType::Searchset);
        bundle.total = Some(matches.len() as u32);
        for resource in matches {
            let full_url = resource
                .id()
                .map(|id| format!("{}/DocumentReference/{}", self.base_url, id));
            let mut entry = BundleEntry::with_resource(full_url, resource);
            entry.search = Some(json!({ "mode": "match" }));
            bundle.push_entry(entry);
        }
        bundle.entry.get_or_insert_with(Vec::new);

        Ok(bundle)
    }
}

/// Decoded content of a Binary. A Binary without data has empty content.
pub fn binary_content(binary: &Binary) -> Result<Vec<u8>> {
    match binary.data.as_deref() {
        Some(data) => STANDARD.decode(data.trim()).map_err(|e| {
            Error::Internal(format!(
                "Binary/{} holds invalid base64 data: {}",
                binary.id.as_deref().unwrap_or("?"),
                e
            ))
        }),
        None => Ok(Vec::new()),
    }
}

/// FHIR `id` grammar: `[A-Za-z0-9\-\.]{1,64}`.
pub fn is_valid_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

// Ids reach the backend URL verbatim, so anything outside the grammar stops here.
fn check_id(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(Error::InvalidResource(format!("'{}' is not a valid resource id", id)))
    }
}

fn not_found(resource_type: &str, id: &str) -> Error {
    Error::ResourceNotFound {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
    }
}
