pub mod bundles;
pub mod documents;
pub mod system;

use crate::Result;
use axum::body::Bytes;
use mhd_models::Bundle;

/// Parse a request body as a Bundle. Any failure is a 400.
pub(crate) fn parse_bundle(body: &Bytes) -> Result<Bundle> {
    if body.is_empty() {
        return Err(crate::Error::InvalidResource(
            "Request body is empty; expected a Bundle".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| crate::Error::InvalidResource(format!("Request body is not valid JSON: {e}")))?;

    match value.get("resourceType").and_then(|v| v.as_str()) {
        Some("Bundle") => {}
        Some(other) => {
            return Err(crate::Error::InvalidResource(format!(
                "Expected a Bundle, got {other}"
            )))
        }
        None => {
            return Err(crate::Error::InvalidResource(
                "Request body has no resourceType".to_string(),
            ))
        }
    }

    serde_json::from_value(value)
        .map_err(|e| crate::Error::InvalidResource(format!("Malformed Bundle: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_bundles() {
        assert!(parse_bundle(&Bytes::new()).is_err());
        assert!(parse_bundle(&Bytes::from_static(b"{not json")).is_err());
        assert!(parse_bundle(&Bytes::from_static(
            br#"{"resourceType":"Patient","id":"1"}"#
        ))
        .is_err());
        assert!(parse_bundle(&Bytes::from_static(br#"{"resourceType":"Bundle"}"#)).is_err());
    }

    #[test]
    fn accepts_transaction_bundle() {
        let bundle = parse_bundle(&Bytes::from_static(
            br#"{"resourceType":"Bundle","type":"transaction","entry":[]}"#,
        ))
        .unwrap();
        assert!(bundle.entries().is_empty());
    }
}
