//! Binary - raw content plus its MIME type

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binary {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<Value>,

    /// Base64 encoded content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "Binary".to_string()
}

impl Binary {
    pub fn new(content_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            resource_type: default_resource_type(),
            id: None,
            meta: None,
            content_type: Some(content_type.into()),
            security_context: None,
            data: Some(data.into()),
            extensions: HashMap::new(),
        }
    }
}
