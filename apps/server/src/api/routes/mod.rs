use crate::api::handlers::{bundles, documents, system};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// FHIR endpoints, mounted under `server.base_path`.
pub fn fhir_routes() -> Router<AppState> {
    Router::new()
        // Bundle Processing Pipeline
        .route("/", post(bundles::process_transaction))
        .route("/$process-message", post(bundles::process_message))
        // Conformance
        .route("/metadata", get(system::capability_statement))
        // Document read surface
        .route("/DocumentReference", get(documents::search_documents))
        .route("/DocumentReference/:id", get(documents::read_document))
        .route("/Binary/:id", get(documents::read_binary))
}

/// Operational endpoints at the server root.
pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
}
