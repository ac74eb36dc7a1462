//! DocumentReference - metadata describing a clinical document

use crate::common::complex::{Attachment, Identifier, Reference};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Master version specific identifier (MHD `uniqueId`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_identifier: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Vec<Identifier>>,

    /// current | superseded | entered-in-error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<DocumentReferenceContent>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "DocumentReference".to_string()
}

impl Default for DocumentReference {
    fn default() -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            meta: None,
            master_identifier: None,
            identifier: None,
            status: None,
            subject: None,
            date: None,
            content: Vec::new(),
            extensions: HashMap::new(),
        }
    }
}

impl DocumentReference {
    /// Identifier used to upsert this document: the master identifier when it has a
    /// value, otherwise the first business identifier that has one.
    pub fn business_identifier(&self) -> Option<&Identifier> {
        self.master_identifier
            .as_ref()
            .filter(|i| i.has_value())
            .or_else(|| {
                self.identifier
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .find(|i| i.has_value())
            })
    }

    /// All identifiers, master identifier first.
    pub fn all_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.master_identifier
            .iter()
            .chain(self.identifier.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentReferenceContent {
    pub attachment: Attachment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl DocumentReferenceContent {
    pub fn with_attachment(attachment: Attachment) -> Self {
        Self {
            attachment,
            format: None,
            extensions: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_identifier_wins() {
        let doc = DocumentReference {
            master_identifier: Some(Identifier::new("urn:ietf:rfc:3986", "urn:oid:1")),
            identifier: Some(vec![Identifier::new("http://example.org", "2")]),
            ..Default::default()
        };
        assert_eq!(
            doc.business_identifier().and_then(|i| i.value.as_deref()),
            Some("urn:oid:1")
        );
        assert_eq!(doc.all_identifiers().count(), 2);
    }

    #[test]
    fn falls_back_to_first_identifier_with_value() {
        let doc = DocumentReference {
            master_identifier: Some(Identifier::default()),
            identifier: Some(vec![
                Identifier::default(),
                Identifier::new("http://example.org", "2"),
            ]),
            ..Default::default()
        };
        assert_eq!(
            doc.business_identifier().and_then(Identifier::search_token),
            Some("http://example.org|2".to_string())
        );
    }

    #[test]
    fn no_identifier() {
        assert!(DocumentReference::default().business_identifier().is_none());
    }
}
