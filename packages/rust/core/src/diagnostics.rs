//! Diagnostics emitted while enriching a batch.
//!
//! The enricher reports through [`EnrichmentDiagnostics`] at fixed points and
//! never inspects what the sink does with it. [`TracingDiagnostics`] is the
//! default; tests plug in a recorder.

use tracing::{info, warn};

use marginkit_store::StoreError;

/// Sink for per-batch and per-item enrichment events.
pub trait EnrichmentDiagnostics: Send + Sync {
    /// The item at `index` has no usable identifier; its lookup was skipped.
    fn missing_identifier(&self, index: usize);

    /// The read of `path` failed; the item was left unchanged.
    fn lookup_failed(&self, path: &str, error: &StoreError);

    /// The formula produced a non-finite margin for `path`; nothing was attached.
    fn invalid_margin(&self, path: &str, margin: f64);

    /// The configured formula is not one of the known names. Reported once per batch.
    fn unrecognized_formula(&self, name: &str);
}

/// Emits every event as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl EnrichmentDiagnostics for TracingDiagnostics {
    fn missing_identifier(&self, index: usize) {
        info!(index, "item has no item_id, skipping lookup");
    }

    fn lookup_failed(&self, path: &str, error: &StoreError) {
        if error.is_not_found() {
            info!(path, "no reference document, leaving item unchanged");
        } else {
            warn!(path, error = %error, "reference lookup failed");
        }
    }

    fn invalid_margin(&self, path: &str, margin: f64) {
        warn!(path, margin, "computed margin is not a finite number, leaving item unchanged");
    }

    fn unrecognized_formula(&self, name: &str) {
        warn!(value_calculation = name, "unrecognized value_calculation, margins will be 0");
    }
}

/// No-op diagnostics for headless/test usage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentDiagnostics;

impl EnrichmentDiagnostics for SilentDiagnostics {
    fn missing_identifier(&self, _index: usize) {}
    fn lookup_failed(&self, _path: &str, _error: &StoreError) {}
    fn invalid_margin(&self, _path: &str, _margin: f64) {}
    fn unrecognized_formula(&self, _name: &str) {}
}
