//! Prometheus metrics for bundle processing

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Bundles handled, by intent (message|transaction) and result (completed|rejected).
    pub static ref BUNDLES_PROCESSED: IntCounterVec = IntCounterVec::new(
        Opts::new("mhd_bundles_processed_total", "Bundles processed by the gateway"),
        &["intent", "result"]
    )
    .expect("metric definition is valid");

    /// Focal resources submitted to the backend, by resource type and result (success|failure).
    pub static ref RESOURCES_PERSISTED: IntCounterVec = IntCounterVec::new(
        Opts::new("mhd_resources_persisted_total", "Resources submitted to the backend store"),
        &["resource_type", "result"]
    )
    .expect("metric definition is valid");

    /// Attachment locators handled, by result (relocated|unresolved|failed).
    pub static ref ATTACHMENTS_RELOCATED: IntCounterVec = IntCounterVec::new(
        Opts::new("mhd_attachments_relocated_total", "Attachment locators processed"),
        &["result"]
    )
    .expect("metric definition is valid");
}

static REGISTER: Once = Once::new();

/// Register the gateway collectors with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
            Box::new(BUNDLES_PROCESSED.clone()),
            Box::new(RESOURCES_PERSISTED.clone()),
            Box::new(ATTACHMENTS_RELOCATED.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!(error = %e, "Failed to register metric");
            }
        }

        #[cfg(target_os = "linux")]
        if let Err(e) = REGISTRY.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        )) {
            tracing::warn!(error = %e, "Failed to register process metrics");
        }
    });
}

/// Render all registered metrics in the Prometheus text exposition format.
pub fn render() -> crate::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {e}")))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not valid UTF-8: {e}")))
}
