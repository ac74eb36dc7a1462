//! FHIR R4 data model for the MHD document gateway
//!
//! Only the resources the gateway reads or writes are modelled. Members that are
//! not modelled are kept in a flattened map on every struct, so a resource that
//! passes through the gateway is forwarded without losing client data.

pub mod binary;
pub mod bundle;
pub mod common;
pub mod document_reference;
pub mod message_header;
pub mod operation_outcome;
pub mod resource;

pub use binary::Binary;
pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse, BundleType};
pub use common::complex::{Attachment, CodeableConcept, Coding, Identifier, Reference};
pub use document_reference::{DocumentReference, DocumentReferenceContent};
pub use message_header::MessageHeader;
pub use operation_outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use resource::{Resource, ResourceKind};
