//! IHE MHD document-sharing gateway
//!
//! Accepts FHIR message and transaction bundles, stores the document metadata and
//! content they carry through a [`store::PersistenceGateway`], and answers with an
//! OperationOutcome or a transaction-response Bundle.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod services;
pub mod state;
pub mod store;

pub use error::{Error, Result};
