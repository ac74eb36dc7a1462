//! Polymorphic resource model
//!
//! `Resource` is a closed set of the resource types the gateway acts on, plus an
//! opaque `Other` variant that carries every other resource type unchanged.
//! Dispatch happens on `resourceType` when deserializing.

use crate::{Binary, DocumentReference, MessageHeader, OperationOutcome};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Discriminant of [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    MessageHeader,
    DocumentReference,
    Binary,
    OperationOutcome,
    Other,
}

impl ResourceKind {
    /// Resolve a FHIR type name. Types that are not modelled map to `Other`.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "MessageHeader" => Self::MessageHeader,
            "DocumentReference" => Self::DocumentReference,
            "Binary" => Self::Binary,
            "OperationOutcome" => Self::OperationOutcome,
            _ => Self::Other,
        }
    }

    /// FHIR type name; `None` for `Other`, whose name lives on the instance.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::MessageHeader => Some("MessageHeader"),
            Self::DocumentReference => Some("DocumentReference"),
            Self::Binary => Some("Binary"),
            Self::OperationOutcome => Some("OperationOutcome"),
            Self::Other => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name().unwrap_or("Other"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    MessageHeader(MessageHeader),
    DocumentReference(DocumentReference),
    Binary(Binary),
    OperationOutcome(OperationOutcome),
    Other(Value),
}

impl Resource {
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| serde_json::Error::custom("resource is missing resourceType"))?;

        match ResourceKind::from_type_name(resource_type) {
            ResourceKind::MessageHeader => serde_json::from_value(value).map(Self::MessageHeader),
            ResourceKind::DocumentReference => {
                serde_json::from_value(value).map(Self::DocumentReference)
            }
            ResourceKind::Binary => serde_json::from_value(value).map(Self::Binary),
            ResourceKind::OperationOutcome => {
                serde_json::from_value(value).map(Self::OperationOutcome)
            }
            ResourceKind::Other => Ok(Self::Other(value)),
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::MessageHeader(_) => ResourceKind::MessageHeader,
            Self::DocumentReference(_) => ResourceKind::DocumentReference,
            Self::Binary(_) => ResourceKind::Binary,
            Self::OperationOutcome(_) => ResourceKind::OperationOutcome,
            Self::Other(_) => ResourceKind::Other,
        }
    }

    pub fn resource_type(&self) -> &str {
        match self {
            Self::MessageHeader(r) => &r.resource_type,
            Self::DocumentReference(r) => &r.resource_type,
            Self::Binary(r) => &r.resource_type,
            Self::OperationOutcome(r) => &r.resource_type,
            Self::Other(value) => value
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::MessageHeader(r) => r.id.as_deref(),
            Self::DocumentReference(r) => r.id.as_deref(),
            Self::Binary(r) => r.id.as_deref(),
            Self::OperationOutcome(r) => r.id.as_deref(),
            Self::Other(value) => value.get("id").and_then(Value::as_str),
        }
    }

    pub fn as_message_header(&self) -> Option<&MessageHeader> {
        match self {
            Self::MessageHeader(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_document_reference(&self) -> Option<&DocumentReference> {
        match self {
            Self::DocumentReference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Self::Binary(r) => Some(r),
            _ => None,
        }
    }
}

impl From<DocumentReference> for Resource {
    fn from(value: DocumentReference) -> Self {
        Self::DocumentReference(value)
    }
}

impl From<Binary> for Resource {
    fn from(value: Binary) -> Self {
        Self::Binary(value)
    }
}

impl From<MessageHeader> for Resource {
    fn from(value: MessageHeader) -> Self {
        Self::MessageHeader(value)
    }
}

impl From<OperationOutcome> for Resource {
    fn from(value: OperationOutcome) -> Self {
        Self::OperationOutcome(value)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::MessageHeader(r) => r.serialize(serializer),
            Self::DocumentReference(r) => r.serialize(serializer),
            Self::Binary(r) => r.serialize(serializer),
            Self::OperationOutcome(r) => r.serialize(serializer),
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Resource::from_value(value).map_err(D::Error::custom)
    }
}
