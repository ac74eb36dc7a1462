//! In-memory resource store
//!
//! Backs `backend.kind = "memory"` and the test suite. Upserts by business
//! identifier exactly like the HTTP backend's conditional update, and finds
//! Binaries by content digest, so resubmitting a bundle does not create
//! duplicates.

use super::{
    has_content_digest, PersistableResource, PersistedResource, PersistenceGateway, UpsertKey,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use mhd_models::{DocumentReference, Resource};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredResource {
    resource: Resource,
    version: u64,
}

#[derive(Default)]
pub struct InMemoryResourceStore {
    // resource type -> id -> stored copy
    resources: RwLock<HashMap<String, HashMap<String, StoredResource>>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources of one type.
    pub async fn count(&self, resource_type: &str) -> usize {
        self.resources
            .read()
            .await
            .get(resource_type)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryResourceStore {
    async fn create_or_update(&self, resource: PersistableResource) -> Result<PersistedResource> {
        let resource_type = resource.resource_type();
        let key = resource.upsert_key();

        let mut all = self.resources.write().await;
        let by_id = all.entry(resource_type.to_string()).or_default();

        let existing_id = match &key {
            UpsertKey::Identifier(token) => {
                let matches: Vec<&String> = by_id
                    .iter()
                    .filter(|(_, stored)| has_identifier(&stored.resource, token))
                    .map(|(id, _)| id)
                    .collect();
                if matches.len() > 1 {
                    return Err(crate::Error::BackendStatus {
                        status: 412,
                        message: format!(
                            "{} {} resources match identifier {}",
                            matches.len(),
                            resource_type,
                            token
                        ),
                    });
                }
                matches.first().map(|id| id.to_string())
            }
            UpsertKey::Id(id) => by_id.contains_key(id).then(|| id.clone()),
            UpsertKey::ContentDigest(digest) => {
                // Conditional create: an identical Binary is returned as is.
                let existing = by_id.iter().find(|(_, stored)| {
                    stored
                        .resource
                        .as_binary()
                        .map(|binary| has_content_digest(binary, digest))
                        .unwrap_or(false)
                });
                if let Some((id, stored)) = existing {
                    tracing::debug!(resource_type, id = %id, "Binary content already stored");
                    return Ok(PersistedResource {
                        resource_type: resource_type.to_string(),
                        id: id.clone(),
                        version_id: Some(stored.version.to_string()),
                        updated: true,
                    });
                }
                None
            }
            UpsertKey::Create => None,
        };

        let updated = existing_id.is_some();
        let id = match (existing_id, &key) {
            (Some(id), _) => id,
            (None, UpsertKey::Id(id)) => id.clone(),
            (None, _) => Uuid::new_v4().to_string(),
        };
        let version = by_id.get(&id).map(|s| s.version + 1).unwrap_or(1);

        let mut resource = resource.into_stored_resource();
        stamp_identity(&mut resource, &id, version);
        by_id.insert(id.clone(), StoredResource { resource, version });

        tracing::debug!(resource_type, id = %id, version, updated, "Stored resource in memory");

        Ok(PersistedResource {
            resource_type: resource_type.to_string(),
            id,
            version_id: Some(version.to_string()),
            updated,
        })
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Resource>> {
        Ok(self
            .resources
            .read()
            .await
            .get(resource_type)
            .and_then(|by_id| by_id.get(id))
            .map(|stored| stored.resource.clone()))
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Resource>> {
        // Each parameter is a set of ORed alternatives; parameters are ANDed.
        let criteria = params
            .iter()
            .map(|(name, value)| parse_param(name, value))
            .collect::<Result<Vec<_>>>()?;

        let all = self.resources.read().await;
        let Some(by_id) = all.get(resource_type) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<&StoredResource> = by_id
            .values()
            .filter(|stored| {
                criteria
                    .iter()
                    .all(|alternatives| alternatives.iter().any(|c| c.matches(&stored.resource)))
            })
            .collect();
        matches.sort_by(|a, b| a.resource.id().cmp(&b.resource.id()));

        Ok(matches.into_iter().map(|s| s.resource.clone()).collect())
    }
}

fn has_identifier(resource: &Resource, token: &str) -> bool {
    resource
        .as_document_reference()
        .map(|doc| doc.all_identifiers().any(|i| i.matches_token(token)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
enum Criterion {
    Id(String),
    Identifier(String),
    Subject(String),
    Status(String),
    Date(DatePrefix, DateRange),
}

fn parse_param(name: &str, value: &str) -> Result<Vec<Criterion>> {
    value
        .split(',')
        .map(|v| {
            Ok(match name {
                "_id" => Criterion::Id(v.to_string()),
                "identifier" => Criterion::Identifier(v.to_string()),
                "patient" | "subject" => Criterion::Subject(v.to_string()),
                "status" => Criterion::Status(v.to_string()),
                "date" => {
                    let (prefix, raw) = DatePrefix::split(v);
                    let range = DateRange::parse(raw).ok_or_else(|| {
                        crate::Error::InvalidResource(format!("Invalid date search value '{}'", v))
                    })?;
                    Criterion::Date(prefix, range)
                }
                other => {
                    return Err(crate::Error::InvalidResource(format!(
                        "Search parameter '{}' is not supported",
                        other
                    )))
                }
            })
        })
        .collect()
}

impl Criterion {
    fn matches(&self, resource: &Resource) -> bool {
        let doc = resource.as_document_reference();
        match self {
            Self::Id(id) => resource.id() == Some(id.as_str()),
            Self::Identifier(token) => has_identifier(resource, token),
            Self::Subject(v) => doc
                .and_then(subject_reference)
                .map(|r| r == v.as_str() || r == format!("Patient/{v}") || r.ends_with(&format!("/{v}")))
                .unwrap_or(false),
            Self::Status(v) => doc.and_then(|d| d.status.as_deref()) == Some(v.as_str()),
            Self::Date(prefix, range) => doc
                .and_then(|d| d.date.as_deref())
                .and_then(DateRange::parse)
                .map(|value| prefix.matches(value.start, range))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl DatePrefix {
    fn split(value: &str) -> (Self, &str) {
        let prefix = match value.get(..2) {
            Some("eq") => Self::Eq,
            Some("ne") => Self::Ne,
            Some("gt") => Self::Gt,
            Some("lt") => Self::Lt,
            Some("ge") => Self::Ge,
            Some("le") => Self::Le,
            _ => return (Self::Eq, value),
        };
        (prefix, &value[2..])
    }

    /// The stored date is compared as a point in time against the range the
    /// search value's precision implies.
    fn matches(self, value: DateTime<Utc>, range: &DateRange) -> bool {
        match self {
            Self::Eq => value >= range.start && value < range.end,
            Self::Ne => !(value >= range.start && value < range.end),
            Self::Gt => value >= range.end,
            Self::Lt => value < range.start,
            Self::Ge => value >= range.start,
            Self::Le => value < range.end,
        }
    }
}

/// Half-open `[start, end)` interval covered by a FHIR date/dateTime/instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let midnight =
            |y: i32, m: u32| NaiveDate::from_ymd_opt(y, m, 1).map(|d| d.and_time(NaiveTime::MIN).and_utc());

        match raw.len() {
            // 2024
            4 => {
                let year: i32 = raw.parse().ok()?;
                Some(Self {
                    start: midnight(year, 1)?,
                    end: midnight(year + 1, 1)?,
                })
            }
            // 2024-03
            7 => {
                let (year, month) = raw.split_once('-')?;
                let year: i32 = year.parse().ok()?;
                let month: u32 = month.parse().ok()?;
                let end = if month == 12 {
                    midnight(year + 1, 1)?
                } else {
                    midnight(year, month + 1)?
                };
                Some(Self {
                    start: midnight(year, month)?,
                    end,
                })
            }
            // 2024-03-15
            10 => {
                let start = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()?
                    .and_time(NaiveTime::MIN)
                    .and_utc();
                Some(Self {
                    start,
                    end: start + Duration::days(1),
                })
            }
            _ => {
                let start = DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .or_else(|_| {
                        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.and_utc())
                    })
                    .ok()?;
                Some(Self {
                    start,
                    end: start + Duration::seconds(1),
                })
            }
        }
    }
}

fn subject_reference(doc: &DocumentReference) -> Option<&str> {
    doc.subject.as_ref().and_then(|s| s.reference.as_deref())
}

/// Sets id and version metadata, keeping any tags the resource already carries.
fn stamp_identity(resource: &mut Resource, id: &str, version: u64) {
    let meta = match resource {
        Resource::DocumentReference(doc) => {
            doc.id = Some(id.to_string());
            &mut doc.meta
        }
        Resource::Binary(binary) => {
            binary.id = Some(id.to_string());
            &mut binary.meta
        }
        Resource::MessageHeader(_) | Resource::OperationOutcome(_) | Resource::Other(_) => return,
    };

    let meta = meta.get_or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    meta["versionId"] = json!(version.to_string());
    meta["lastUpdated"] = json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
}
