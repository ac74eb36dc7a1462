//! FHIR complex datatypes shared across resources
//!
//! No validation - just data representation. Unknown members land in `extensions`
//! so they survive a deserialize/serialize cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Coding - a reference to a code defined by a terminology system
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            ..Default::default()
        }
    }
}

/// CodeableConcept - a set of codings plus free text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding: Option<Vec<Coding>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl CodeableConcept {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            coding: None,
            text: Some(text.into()),
            extensions: HashMap::new(),
        }
    }
}

/// Identifier - a business identifier, such as an MHD document unique id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>, // usual | official | temp | secondary | old

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            use_: None,
            system: Some(system.into()),
            value: Some(value.into()),
            extensions: HashMap::new(),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Render as a token search value: `system|value`, or just `value` without a system.
    pub fn search_token(&self) -> Option<String> {
        let value = self.value.as_deref().filter(|v| !v.is_empty())?;
        match self.system.as_deref().filter(|s| !s.is_empty()) {
            Some(system) => Some(format!("{}|{}", system, value)),
            None => Some(value.to_string()),
        }
    }

    /// Token match as used by `identifier=` searches (`system|value`, `|value` or `value`).
    pub fn matches_token(&self, token: &str) -> bool {
        let Some(value) = self.value.as_deref() else {
            return false;
        };
        match token.split_once('|') {
            Some(("", v)) => self.system.is_none() && v == value,
            Some((s, v)) => self.system.as_deref() == Some(s) && v == value,
            None => token == value,
        }
    }
}

/// Reference from one resource to another
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl Reference {
    pub fn to(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Default::default()
        }
    }
}

/// Attachment - content inline (`data`) or by locator (`url`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Base64 encoded content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation: Option<String>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

impl Attachment {
    /// Locator, if present and non-empty.
    pub fn locator(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}
