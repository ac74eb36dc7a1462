//! Attachment Relocator
//!
//! Stores the Binaries a DocumentReference points at and rewrites each attachment
//! locator to the Binary's external address. Runs before the DocumentReference
//! itself is persisted so the stored document carries the rewritten URLs.

use super::locator;
use crate::metrics::{ATTACHMENTS_RELOCATED, RESOURCES_PERSISTED};
use crate::store::{PersistableResource, PersistenceGateway};
use mhd_models::{Bundle, DocumentReference, Resource};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    /// Position of the content item within `DocumentReference.content`.
    pub content_index: usize,
    /// The locator that was left in place.
    pub reference: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub relocated: usize,
    pub unresolved: usize,
    pub failures: Vec<AttachmentFailure>,
}

pub struct AttachmentRelocator {
    gateway: Arc<dyn PersistenceGateway>,
    base_url: String,
}

impl AttachmentRelocator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, base_url: &str) -> Self {
        Self {
            gateway,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// External address of a stored Binary.
    pub fn binary_url(&self, id: &str) -> String {
        format!("{}/Binary/{}", self.base_url, id)
    }

    /// Relocate every attachment of `document` that resolves to a Binary in `bundle`.
    ///
    /// Never fails as a whole: unresolved locators stay as they are, and a Binary
    /// the gateway rejects is recorded in the report with its locator untouched.
    pub async fn relocate(&self, document: &mut DocumentReference, bundle: &Bundle) -> RelocationReport {
        let mut report = RelocationReport::default();
        // Several content items may point at the same Binary; store it once.
        let mut stored: HashMap<String, String> = HashMap::new();

        for (content_index, content) in document.content.iter_mut().enumerate() {
            let Some(reference) = content.attachment.locator().map(str::to_string) else {
                continue;
            };

            if let Some(url) = stored.get(&reference) {
                content.attachment.url = Some(url.clone());
                report.relocated += 1;
                continue;
            }

            let Some(binary) =
                locator::find_by_reference(bundle, "Binary", &reference).and_then(Resource::as_binary)
            else {
                tracing::debug!(content_index, reference = %reference, "Attachment does not reference a bundled Binary");
                ATTACHMENTS_RELOCATED.with_label_values(&["unresolved"]).inc();
                report.unresolved += 1;
                continue;
            };

            match self
                .gateway
                .create_or_update(PersistableResource::Binary(binary.clone()))
                .await
            {
                Ok(persisted) => {
                    let url = self.binary_url(&persisted.id);
                    tracing::debug!(content_index, from = %reference, to = %url, "Relocated attachment");
                    RESOURCES_PERSISTED.with_label_values(&["Binary", "success"]).inc();
                    ATTACHMENTS_RELOCATED.with_label_values(&["relocated"]).inc();

                    content.attachment.url = Some(url.clone());
                    stored.insert(reference, url);
                    report.relocated += 1;
                }
                Err(e) => {
                    tracing::warn!(content_index, reference = %reference, error = %e, "Failed to store attachment Binary");
                    RESOURCES_PERSISTED.with_label_values(&["Binary", "failure"]).inc();
                    ATTACHMENTS_RELOCATED.with_label_values(&["failed"]).inc();

                    report.failures.push(AttachmentFailure {
                        content_index,
                        reference,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
