#![allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::*;

fn process_message_path() -> String {
    format!("{BASE}/$process-message")
}

#[tokio::test]
async fn document_event_reports_each_persisted_document() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = message_bundle(
                "document",
                vec![
                    entry("urn:uuid:doc-1", document_reference("urn:oid:1.1", &[])),
                    entry("urn:uuid:doc-2", document_reference("urn:oid:1.2", &[])),
                ],
            );

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::OK, "$process-message");
            assert_eq!(outcome["resourceType"], "OperationOutcome");

            let issues = outcome["issue"].as_array().unwrap();
            assert_eq!(issues.len(), 2);
            for issue in issues {
                assert_eq!(issue["severity"], "information");
                assert_eq!(issue["code"], "informational");
                let location = issue["location"][0].as_str().unwrap();
                assert!(location.starts_with("DocumentReference/"), "{location}");
            }
            assert_eq!(app.store.count("DocumentReference").await, 2);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn document_event_relocates_bundled_binary() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = message_bundle(
                "document",
                vec![
                    entry("urn:uuid:doc-1", document_reference("urn:oid:2.1", &["urn:uuid:bin-1"])),
                    entry("urn:uuid:bin-1", binary("JVBERi0xLjQ=")),
                ],
            );

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::OK, "$process-message");

            let location = outcome["issue"][0]["location"][0].as_str().unwrap().to_string();
            let (status, stored) = app.get_json(&format!("{BASE}/{location}")).await?;
            assert_status(status, StatusCode::OK, "read stored document");

            let url = stored["content"][0]["attachment"]["url"].as_str().unwrap();
            assert!(
                url.starts_with(&format!("{EXTERNAL_BASE_URL}/Binary/")),
                "attachment not relocated: {url}"
            );
            assert_eq!(app.store.count("Binary").await, 1);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn unknown_event_returns_empty_outcome_without_persisting() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = message_bundle(
                "unknown",
                vec![entry("urn:uuid:doc-1", document_reference("urn:oid:3.1", &[]))],
            );

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::OK, "$process-message");
            assert_eq!(outcome["resourceType"], "OperationOutcome");
            assert_eq!(outcome["issue"], json!([]));
            assert_eq!(app.store.writes(), 0);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn message_without_header_is_rejected_before_persistence() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = json!({
                "resourceType": "Bundle",
                "type": "message",
                "entry": [entry("urn:uuid:doc-1", document_reference("urn:oid:4.1", &[]))]
            });

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::BAD_REQUEST, "message without MessageHeader");
            assert_eq!(outcome["resourceType"], "OperationOutcome");
            assert_eq!(outcome["issue"][0]["severity"], "error");
            assert_eq!(outcome["issue"][0]["code"], "invalid");
            assert_eq!(app.store.writes(), 0);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn transaction_posted_as_message_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = transaction_bundle(vec![transaction_entry(
                "urn:uuid:doc-1",
                document_reference("urn:oid:5.1", &[]),
            )]);

            let (status, _outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::BAD_REQUEST, "wrong bundle type");
            assert_eq!(app.store.writes(), 0);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn failed_document_is_reported_as_error_issue() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.store.fail_identifier("urn:oid:6.2");
            let bundle = message_bundle(
                "document",
                vec![
                    entry("urn:uuid:doc-1", document_reference("urn:oid:6.1", &[])),
                    entry("urn:uuid:doc-2", document_reference("urn:oid:6.2", &[])),
                    entry("urn:uuid:doc-3", document_reference("urn:oid:6.3", &[])),
                ],
            );

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::OK, "$process-message");

            let severities: Vec<_> = outcome["issue"]
                .as_array()
                .unwrap()
                .iter()
                .map(|i| i["severity"].as_str().unwrap().to_string())
                .collect();
            assert_eq!(severities, vec!["information", "error", "information"]);
            assert_eq!(outcome["issue"][1]["expression"][0], "Bundle.entry[2].resource");
            assert!(outcome["issue"][1]["diagnostics"]
                .as_str()
                .unwrap()
                .contains("urn:uuid:doc-2"));
            assert_eq!(app.store.count("DocumentReference").await, 2);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn omit_policy_drops_failed_documents_silently() -> anyhow::Result<()> {
    with_test_app_with_config(omit_failures_config(), |app| {
        Box::pin(async move {
            app.store.fail_identifier("urn:oid:7.1");
            let bundle = message_bundle(
                "document",
                vec![
                    entry("urn:uuid:doc-1", document_reference("urn:oid:7.1", &[])),
                    entry("urn:uuid:doc-2", document_reference("urn:oid:7.2", &[])),
                ],
            );

            let (status, outcome) = app.post_bundle(&process_message_path(), &bundle).await?;
            assert_status(status, StatusCode::OK, "$process-message");

            let issues = outcome["issue"].as_array().unwrap();
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0]["severity"], "information");

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn resubmitted_message_does_not_duplicate_documents() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = message_bundle(
                "document",
                vec![entry("urn:uuid:doc-1", document_reference("urn:oid:8.1", &[]))],
            );

            let (_, first) = app.post_bundle(&process_message_path(), &bundle).await?;
            let (_, second) = app.post_bundle(&process_message_path(), &bundle).await?;

            assert_eq!(first["issue"][0]["location"], second["issue"][0]["location"]);
            assert_eq!(app.store.count("DocumentReference").await, 1);

            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn resubmitted_message_with_binary_does_not_duplicate_it() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let bundle = message_bundle(
                "document",
                vec![
                    entry("urn:uuid:doc-1", document_reference("urn:oid:8.2", &["urn:uuid:bin-1"])),
                    entry("urn:uuid:bin-1", binary("JVBERi0xLjQ=")),
                ],
            );

            let (_, first) = app.post_bundle(&process_message_path(), &bundle).await?;
            let (_, second) = app.post_bundle(&process_message_path(), &bundle).await?;

            assert_eq!(first["issue"][0]["location"], second["issue"][0]["location"]);
            assert_eq!(app.store.count("DocumentReference").await, 1);
            assert_eq!(app.store.count("Binary").await, 1);

            Ok(())
        })
    })
    .await
}
