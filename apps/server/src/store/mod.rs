//! Persistence Gateway: the backend resource store the pipeline writes to
//!
//! The gateway owns identity assignment. The pipeline never invents ids; it hands
//! a resource over and reads back what the store assigned.

pub mod http;
pub mod memory;

pub use http::HttpResourceStore;
pub use memory::InMemoryResourceStore;

use crate::Result;
use async_trait::async_trait;
use mhd_models::{Binary, DocumentReference, Resource};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// `meta.tag` system under which a Binary's content digest is recorded
pub const CONTENT_DIGEST_SYSTEM: &str = "urn:mhd-gateway:binary-sha256";

/// Abstract interface over the backend store
///
/// Implementations must tolerate concurrent calls from independent requests and
/// must make `create_or_update` idempotent for a given business identifier.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create the resource, or update the existing one with the same business
    /// identifier (or id). Returns the identity the store assigned.
    async fn create_or_update(&self, resource: PersistableResource) -> Result<PersistedResource>;

    /// Read a resource by type and id. `Ok(None)` when it does not exist.
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Resource>>;

    /// Search resources of one type. Parameters are FHIR search name/value pairs.
    async fn search(&self, resource_type: &str, params: &[(String, String)])
        -> Result<Vec<Resource>>;
}

/// The resource types the gateway persists
#[derive(Debug, Clone, PartialEq)]
pub enum PersistableResource {
    DocumentReference(DocumentReference),
    Binary(Binary),
}

impl PersistableResource {
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::DocumentReference(_) => "DocumentReference",
            Self::Binary(_) => "Binary",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::DocumentReference(doc) => doc.id.as_deref(),
            Self::Binary(binary) => binary.id.as_deref(),
        }
    }

    /// How the store should locate an existing copy of this resource.
    pub fn upsert_key(&self) -> UpsertKey {
        if let Self::DocumentReference(doc) = self {
            if let Some(token) = doc.business_identifier().and_then(|i| i.search_token()) {
                return UpsertKey::Identifier(token);
            }
        }
        if let Some(id) = self.id().filter(|id| !id.is_empty()) {
            return UpsertKey::Id(id.to_string());
        }
        match self {
            Self::Binary(binary) if binary.data.is_some() => {
                UpsertKey::ContentDigest(content_digest(binary))
            }
            _ => UpsertKey::Create,
        }
    }

    pub fn into_resource(self) -> Resource {
        match self {
            Self::DocumentReference(doc) => Resource::DocumentReference(doc),
            Self::Binary(binary) => Resource::Binary(binary),
        }
    }

    /// The resource as handed to the store. Content-keyed Binaries carry their
    /// digest as a `meta.tag` so a later submission can find them.
    pub fn into_stored_resource(self) -> Resource {
        let key = self.upsert_key();
        let mut resource = self.into_resource();
        if let (UpsertKey::ContentDigest(digest), Resource::Binary(binary)) = (&key, &mut resource) {
            tag_content_digest(binary, digest);
        }
        resource
    }
}

/// Hex SHA-256 over a Binary's content type and base64 payload.
pub fn content_digest(binary: &Binary) -> String {
    let mut hasher = Sha256::new();
    hasher.update(binary.content_type.as_deref().unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(binary.data.as_deref().unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// `_tag` search token for a content digest.
pub fn content_digest_token(digest: &str) -> String {
    format!("{}|{}", CONTENT_DIGEST_SYSTEM, digest)
}

pub fn has_content_digest(binary: &Binary, digest: &str) -> bool {
    binary
        .meta
        .as_ref()
        .and_then(|meta| meta.get("tag"))
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter().any(|tag| {
                tag.get("system").and_then(Value::as_str) == Some(CONTENT_DIGEST_SYSTEM)
                    && tag.get("code").and_then(Value::as_str) == Some(digest)
            })
        })
        .unwrap_or(false)
}

fn tag_content_digest(binary: &mut Binary, digest: &str) {
    if has_content_digest(binary, digest) {
        return;
    }
    let meta = binary.meta.get_or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    let tag = json!({ "system": CONTENT_DIGEST_SYSTEM, "code": digest });
    match meta.get_mut("tag").and_then(Value::as_array_mut) {
        Some(tags) => tags.push(tag),
        None => meta["tag"] = json!([tag]),
    }
}

impl TryFrom<Resource> for PersistableResource {
    type Error = crate::Error;

    fn try_from(resource: Resource) -> Result<Self> {
        match resource {
            Resource::DocumentReference(doc) => Ok(Self::DocumentReference(doc)),
            Resource::Binary(binary) => Ok(Self::Binary(binary)),
            Resource::MessageHeader(_) | Resource::OperationOutcome(_) | Resource::Other(_) => {
                Err(crate::Error::NotSupported(format!(
                    "{} cannot be persisted by this gateway",
                    resource.resource_type()
                )))
            }
        }
    }
}

/// Upsert strategy derived from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertKey {
    /// Conditional update on `identifier=<token>`
    Identifier(String),
    /// Update at a client-known id
    Id(String),
    /// Conditional create on the content digest tag (Binaries without an id)
    ContentDigest(String),
    /// Plain create with a store-assigned id
    Create,
}

/// Identity assigned by the store to a persisted resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedResource {
    pub resource_type: String,
    pub id: String,
    pub version_id: Option<String>,
    /// True when an existing resource was updated rather than created.
    pub updated: bool,
}

impl PersistedResource {
    /// Relative location, e.g. `DocumentReference/123`.
    pub fn location(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

/// Parsed `[base/]Type/id[/_history/vid]` reference or URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub version_id: Option<String>,
}

impl ParsedUrl {
    pub fn parse(raw: &str) -> Self {
        let mut path = raw;

        // Remove query string
        if let Some((p, _q)) = path.split_once('?') {
            path = p;
        }

        // Strip scheme + host
        if let Some(scheme_idx) = path.find("://") {
            let after_scheme = &path[scheme_idx + 3..];
            path = after_scheme.split_once('/').map(|(_, p)| p).unwrap_or("");
        }

        let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut version_id = None;
        if let Some(history_idx) = parts.iter().position(|p| *p == "_history") {
            version_id = parts.get(history_idx + 1).map(|s| s.to_string());
            parts.truncate(history_idx);
        }

        match parts.len() {
            0 => Self {
                resource_type: None,
                resource_id: None,
                version_id,
            },
            1 => Self {
                resource_type: parts.last().map(|s| s.to_string()),
                resource_id: None,
                version_id,
            },
            _ => Self {
                resource_type: parts.get(parts.len() - 2).map(|s| s.to_string()),
                resource_id: parts.last().map(|s| s.to_string()),
                version_id,
            },
        }
    }

    /// `Type/id` when both parts are present.
    pub fn identity(&self) -> Option<String> {
        match (&self.resource_type, &self.resource_id) {
            (Some(rt), Some(id)) => Some(format!("{}/{}", rt, id)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhd_models::Identifier;

    #[test]
    fn parses_relative_and_absolute_references() {
        let relative = ParsedUrl::parse("Binary/abc");
        assert_eq!(relative.identity().as_deref(), Some("Binary/abc"));

        let absolute = ParsedUrl::parse("https://store.example.org/fhir/Binary/abc/_history/3");
        assert_eq!(absolute.identity().as_deref(), Some("Binary/abc"));
        assert_eq!(absolute.version_id.as_deref(), Some("3"));

        assert_eq!(ParsedUrl::parse("urn:uuid:1234").identity(), None);
        assert_eq!(ParsedUrl::parse("Binary?_id=1").identity(), None);
    }

    #[test]
    fn upsert_key_prefers_business_identifier() {
        let doc = DocumentReference {
            id: Some("local".to_string()),
            master_identifier: Some(Identifier::new("urn:ietf:rfc:3986", "urn:oid:9")),
            ..Default::default()
        };
        assert_eq!(
            PersistableResource::DocumentReference(doc).upsert_key(),
            UpsertKey::Identifier("urn:ietf:rfc:3986|urn:oid:9".to_string())
        );
    }

    #[test]
    fn upsert_key_falls_back_to_id_then_digest_then_create() {
        let mut binary = Binary::new("text/plain", "aGk=");
        let digest = content_digest(&binary);
        assert_eq!(digest.len(), 64);
        assert_eq!(
            PersistableResource::Binary(binary.clone()).upsert_key(),
            UpsertKey::ContentDigest(digest)
        );

        binary.id = Some("b1".to_string());
        assert_eq!(
            PersistableResource::Binary(binary.clone()).upsert_key(),
            UpsertKey::Id("b1".to_string())
        );

        binary.id = None;
        binary.data = None;
        assert_eq!(PersistableResource::Binary(binary).upsert_key(), UpsertKey::Create);

        assert_eq!(
            PersistableResource::DocumentReference(DocumentReference::default()).upsert_key(),
            UpsertKey::Create
        );
    }

    #[test]
    fn digest_depends_on_content_and_type() {
        let pdf = Binary::new("application/pdf", "aGk=");
        assert_eq!(content_digest(&pdf), content_digest(&pdf.clone()));
        assert_ne!(content_digest(&pdf), content_digest(&Binary::new("text/plain", "aGk=")));
        assert_ne!(content_digest(&pdf), content_digest(&Binary::new("application/pdf", "aGV5")));
    }

    #[test]
    fn stored_binary_carries_digest_tag_once() {
        let mut binary = Binary::new("application/pdf", "aGk=");
        binary.meta = Some(json!({ "tag": [{ "system": "urn:other", "code": "x" }] }));
        let digest = content_digest(&binary);

        let Resource::Binary(stored) = PersistableResource::Binary(binary).into_stored_resource()
        else {
            panic!("expected a Binary");
        };
        assert!(has_content_digest(&stored, &digest));
        assert_eq!(stored.meta.as_ref().unwrap()["tag"].as_array().unwrap().len(), 2);

        let Resource::Binary(again) = PersistableResource::Binary(stored).into_stored_resource()
        else {
            panic!("expected a Binary");
        };
        assert_eq!(again.meta.as_ref().unwrap()["tag"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn only_documents_and_binaries_are_persistable() {
        let header = Resource::MessageHeader(mhd_models::MessageHeader::with_event(
            mhd_models::Coding::new("urn:ihe:iti:mhd:2023", "document"),
        ));
        assert!(PersistableResource::try_from(header).is_err());

        let doc = Resource::DocumentReference(DocumentReference::default());
        assert!(PersistableResource::try_from(doc).is_ok());
    }
}
