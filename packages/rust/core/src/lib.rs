//! Margin enrichment for purchase line items.
//!
//! - [`margin`] — pure margin formulas
//! - [`diagnostics`] — injectable reporting of skipped/failed items
//! - [`enricher`] — concurrent per-item lookup and batch assembly

pub mod diagnostics;
pub mod enricher;
pub mod margin;

pub use diagnostics::{EnrichmentDiagnostics, SilentDiagnostics, TracingDiagnostics};
pub use enricher::{EnrichmentSummary, ItemEnricher};
