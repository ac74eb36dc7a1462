//! MessageHeader - declares the intent of a message bundle

use crate::common::complex::{Coding, Reference};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_coding: Option<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Vec<Reference>>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "MessageHeader".to_string()
}

impl MessageHeader {
    pub fn with_event(event: Coding) -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            event_coding: Some(event),
            event_uri: None,
            source: None,
            focus: None,
            extensions: HashMap::new(),
        }
    }

    /// Event code of `eventCoding`, if any.
    pub fn event_code(&self) -> Option<&str> {
        self.event_coding.as_ref().and_then(|c| c.code.as_deref())
    }
}
