//! Bundle Processor
//!
//! Classifies an inbound bundle, walks its focal resources in bundle order, runs
//! attachment relocation for documents, and hands each working copy to the
//! Persistence Gateway. The inbound bundle is only ever read.
//!
//! A request either completes (with per-resource outcomes, some possibly failed)
//! or is rejected before the gateway is called at all.

use super::attachments::{AttachmentFailure, AttachmentRelocator};
use super::locator;
use crate::config::Config;
use crate::metrics::{BUNDLES_PROCESSED, RESOURCES_PERSISTED};
use crate::store::{PersistableResource, PersistedResource, PersistenceGateway};
use crate::{Error, Result};
use axum::http::StatusCode;
use mhd_models::{Bundle, BundleEntry, BundleType, Resource, ResourceKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared purpose of an inbound bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleIntent {
    Message,
    Transaction,
}

impl BundleIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Transaction => "transaction",
        }
    }

    fn expected_type(&self) -> BundleType {
        match self {
            Self::Message => BundleType::Message,
            Self::Transaction => BundleType::Transaction,
        }
    }
}

impl fmt::Display for BundleIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resource kind a bundle acts upon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusPolicy {
    message_events: HashMap<String, ResourceKind>,
}

impl FocusPolicy {
    /// Build from `processing.message_events`. Only persistable kinds are accepted.
    pub fn new(message_events: &HashMap<String, String>) -> Result<Self> {
        let message_events = message_events
            .iter()
            .map(|(event, type_name)| match ResourceKind::from_type_name(type_name) {
                kind @ (ResourceKind::DocumentReference | ResourceKind::Binary) => {
                    Ok((event.clone(), kind))
                }
                ResourceKind::MessageHeader | ResourceKind::OperationOutcome | ResourceKind::Other => {
                    Err(Error::Internal(format!(
                        "Message event '{}' maps to '{}', which cannot be persisted",
                        event, type_name
                    )))
                }
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self { message_events })
    }

    /// Focal kind for a MessageHeader event code; `None` for unrecognized codes.
    pub fn for_event(&self, code: &str) -> Option<ResourceKind> {
        self.message_events.get(code).copied()
    }

    /// Transactions only ever persist document metadata.
    pub fn transaction_focus(&self) -> ResourceKind {
        ResourceKind::DocumentReference
    }
}

impl Default for FocusPolicy {
    fn default() -> Self {
        Self {
            message_events: HashMap::from([(
                "document".to_string(),
                ResourceKind::DocumentReference,
            )]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeResult {
    Persisted(PersistedResource),
    Failed { status: StatusCode, message: String },
}

/// Result of processing one focal resource
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOutcome {
    /// Position of the focal resource's entry in the inbound bundle.
    pub entry_index: usize,
    pub resource_type: String,
    pub full_url: Option<String>,
    pub result: OutcomeResult,
    pub attachment_failures: Vec<AttachmentFailure>,
}

impl ProcessingOutcome {
    pub fn persisted(&self) -> Option<&PersistedResource> {
        match &self.result {
            OutcomeResult::Persisted(persisted) => Some(persisted),
            OutcomeResult::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub intent: BundleIntent,
    /// MessageHeader event code (message bundles only).
    pub event_code: Option<String>,
    /// One per focal resource, in bundle order.
    pub outcomes: Vec<ProcessingOutcome>,
}

impl ProcessingReport {
    fn empty(intent: BundleIntent, event_code: Option<String>) -> Self {
        Self {
            intent,
            event_code,
            outcomes: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.persisted().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct BundleProcessor {
    gateway: Arc<dyn PersistenceGateway>,
    /// `None` when `processing.relocate_attachments` is off.
    relocator: Option<AttachmentRelocator>,
    focus: FocusPolicy,
}

impl BundleProcessor {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        relocator: Option<AttachmentRelocator>,
        focus: FocusPolicy,
    ) -> Self {
        Self {
            gateway,
            relocator,
            focus,
        }
    }

    pub fn from_config(gateway: Arc<dyn PersistenceGateway>, config: &Config) -> Result<Self> {
        let relocator = config
            .processing
            .relocate_attachments
            .then(|| AttachmentRelocator::new(gateway.clone(), config.external_base_url()));
        let focus = FocusPolicy::new(&config.processing.message_events)?;
        Ok(Self::new(gateway, relocator, focus))
    }

    /// Handle a `message` bundle announced by its MessageHeader.
    #[tracing::instrument(skip_all, fields(entries = bundle.entries().len()))]
    pub async fn process_message(&self, bundle: &Bundle) -> Result<ProcessingReport> {
        let intent = BundleIntent::Message;
        check_bundle_type(bundle, intent)?;

        let Some(header) = locator::filter_by_type(bundle, "MessageHeader")
            .into_iter()
            .find_map(Resource::as_message_header)
        else {
            return Err(reject(intent, "Message bundle has no MessageHeader entry".to_string()));
        };

        let event_code = header.event_code().map(str::to_string);
        let Some(focus) = event_code.as_deref().and_then(|code| self.focus.for_event(code)) else {
            tracing::info!(event = ?event_code, "Unrecognized message event; nothing to process");
            BUNDLES_PROCESSED
                .with_label_values(&[intent.as_str(), "completed"])
                .inc();
            return Ok(ProcessingReport::empty(intent, event_code));
        };

        tracing::debug!(event = ?event_code, focus = %focus, "Processing message bundle");
        let outcomes = self.process_focal(bundle, focus).await;
        Ok(self.complete(intent, event_code, outcomes))
    }

    /// Handle a `transaction` bundle. Non-document entries are ignored.
    #[tracing::instrument(skip_all, fields(entries = bundle.entries().len()))]
    pub async fn process_transaction(&self, bundle: &Bundle) -> Result<ProcessingReport> {
        let intent = BundleIntent::Transaction;
        check_bundle_type(bundle, intent)?;

        let outcomes = self
            .process_focal(bundle, self.focus.transaction_focus())
            .await;
        Ok(self.complete(intent, None, outcomes))
    }

    fn complete(
        &self,
        intent: BundleIntent,
        event_code: Option<String>,
        outcomes: Vec<ProcessingOutcome>,
    ) -> ProcessingReport {
        let report = ProcessingReport {
            intent,
            event_code,
            outcomes,
        };
        tracing::info!(
            intent = %intent,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Bundle processed"
        );
        BUNDLES_PROCESSED
            .with_label_values(&[intent.as_str(), "completed"])
            .inc();
        report
    }

    async fn process_focal(&self, bundle: &Bundle, focus: ResourceKind) -> Vec<ProcessingOutcome> {
        let Some(type_name) = focus.type_name() else {
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for (entry_index, entry, resource) in locator::entries_of_type(bundle, type_name) {
            outcomes.push(self.process_resource(bundle, entry_index, entry, resource).await);
        }
        outcomes
    }

    /// Persist one focal resource. Failures are recorded, never propagated.
    async fn process_resource(
        &self,
        bundle: &Bundle,
        entry_index: usize,
        entry: &BundleEntry,
        resource: &Resource,
    ) -> ProcessingOutcome {
        let resource_type = resource.resource_type().to_string();
        let mut attachment_failures = Vec::new();

        let persistable = match resource.clone() {
            Resource::DocumentReference(mut document) => {
                if let Some(relocator) = &self.relocator {
                    let report = relocator.relocate(&mut document, bundle).await;
                    attachment_failures = report.failures;
                }
                Ok(PersistableResource::DocumentReference(document))
            }
            Resource::Binary(binary) => Ok(PersistableResource::Binary(binary)),
            other @ (Resource::MessageHeader(_) | Resource::OperationOutcome(_) | Resource::Other(_)) => {
                PersistableResource::try_from(other)
            }
        };

        let result = match persistable {
            Ok(persistable) => self.gateway.create_or_update(persistable).await,
            Err(e) => Err(e),
        };

        let result = match result {
            Ok(persisted) => {
                tracing::debug!(entry_index, location = %persisted.location(), updated = persisted.updated, "Persisted focal resource");
                RESOURCES_PERSISTED
                    .with_label_values(&[resource_type.as_str(), "success"])
                    .inc();
                OutcomeResult::Persisted(persisted)
            }
            Err(e) => {
                tracing::warn!(entry_index, resource_type = %resource_type, error = %e, "Failed to persist focal resource");
                RESOURCES_PERSISTED
                    .with_label_values(&[resource_type.as_str(), "failure"])
                    .inc();
                OutcomeResult::Failed {
                    status: e.status_code(),
                    message: e.to_string(),
                }
            }
        };

        ProcessingOutcome {
            entry_index,
            resource_type,
            full_url: entry.full_url.clone(),
            result,
            attachment_failures,
        }
    }
}

fn check_bundle_type(bundle: &Bundle, intent: BundleIntent) -> Result<()> {
    if bundle.bundle_type == intent.expected_type() {
        return Ok(());
    }
    Err(reject(
        intent,
        format!(
            "Expected a Bundle of type '{}', got '{}'",
            intent.expected_type().as_str(),
            bundle.bundle_type.as_str()
        ),
    ))
}

fn reject(intent: BundleIntent, message: String) -> Error {
    tracing::warn!(intent = %intent, reason = %message, "Rejected bundle");
    BUNDLES_PROCESSED
        .with_label_values(&[intent.as_str(), "rejected"])
        .inc();
    Error::InvalidResource(message)
}
