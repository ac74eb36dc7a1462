//! Bundle Processing Pipeline and the read services around it
//!
//! Leaf first: the locator resolves references inside a bundle, the relocator
//! stores attachment Binaries, the processor drives both against the
//! Persistence Gateway, and the synthesizer shapes the client response.

pub mod attachments;
pub mod capability;
pub mod documents;
pub mod locator;
pub mod processor;
pub mod response;

pub use attachments::{AttachmentFailure, AttachmentRelocator, RelocationReport};
pub use capability::CapabilityService;
pub use documents::DocumentService;
pub use processor::{
    BundleIntent, BundleProcessor, FocusPolicy, OutcomeResult, ProcessingOutcome,
    ProcessingReport,
};
pub use response::ResponseSynthesizer;
