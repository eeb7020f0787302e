//! Batch enrichment: one concurrent reference lookup per item, joined back
//! in input order.
//!
//! All lookups run as futures on the calling task and are joined with
//! `join_all`; nothing is spawned. Per-item failures become outcomes, so one
//! bad item never fails the batch. Only a config that cannot be used at all
//! fails the call, and it does so before any lookup is issued.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, info, instrument};

use marginkit_shared::{EnrichmentConfig, Item, Result};
use marginkit_store::{DocumentStore, ReadOptions};

use crate::diagnostics::{EnrichmentDiagnostics, TracingDiagnostics};
use crate::margin;

// ---------------------------------------------------------------------------
// EnrichmentSummary
// ---------------------------------------------------------------------------

/// Counts for a completed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentSummary {
    /// Batch size.
    pub items: usize,
    /// Items that received a margin.
    pub enriched: usize,
    /// Items skipped for lack of an identifier.
    pub skipped: usize,
    /// Items whose lookup failed.
    pub lookup_failures: usize,
    /// Items whose computed margin was not finite.
    pub invalid_margins: usize,
    /// Wall time for the whole batch.
    pub duration: Duration,
}

/// What happened to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Enriched,
    Skipped,
    LookupFailed,
    InvalidMargin,
}

// ---------------------------------------------------------------------------
// ItemEnricher
// ---------------------------------------------------------------------------

/// Attaches `margin` to line items using reference documents from a store.
pub struct ItemEnricher {
    store: Arc<dyn DocumentStore>,
    diagnostics: Arc<dyn EnrichmentDiagnostics>,
}

impl ItemEnricher {
    /// Create an enricher reporting through [`TracingDiagnostics`].
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replace the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn EnrichmentDiagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Enrich `items`, returning them in the same order.
    pub async fn enrich(&self, items: Vec<Item>, config: &EnrichmentConfig) -> Result<Vec<Item>> {
        let (items, _summary) = self.enrich_with_summary(items, config).await?;
        Ok(items)
    }

    /// Enrich `items` and also return per-outcome counts.
    #[instrument(skip_all, fields(
        collection = %config.collection_id,
        formula = %config.value_calculation,
        items = items.len()
    ))]
    pub async fn enrich_with_summary(
        &self,
        items: Vec<Item>,
        config: &EnrichmentConfig,
    ) -> Result<(Vec<Item>, EnrichmentSummary)> {
        config.validate()?;

        if !config.value_calculation.is_recognized() {
            self.diagnostics
                .unrecognized_formula(config.value_calculation.as_str());
        }

        let start_time = Instant::now();
        let options = ReadOptions {
            namespace: config.namespace.clone(),
        };

        debug!(store = self.store.name(), "starting lookups");

        let lookups = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.enrich_item(index, item, config, &options));

        // join_all yields results in input order
        let results = join_all(lookups).await;

        let mut summary = EnrichmentSummary {
            items: results.len(),
            ..Default::default()
        };
        let mut enriched_items = Vec::with_capacity(results.len());

        for (item, outcome) in results {
            match outcome {
                ItemOutcome::Enriched => summary.enriched += 1,
                ItemOutcome::Skipped => summary.skipped += 1,
                ItemOutcome::LookupFailed => summary.lookup_failures += 1,
                ItemOutcome::InvalidMargin => summary.invalid_margins += 1,
            }
            enriched_items.push(item);
        }

        summary.duration = start_time.elapsed();

        info!(
            enriched = summary.enriched,
            skipped = summary.skipped,
            lookup_failures = summary.lookup_failures,
            invalid_margins = summary.invalid_margins,
            duration_ms = summary.duration.as_millis(),
            "enrichment completed"
        );

        Ok((enriched_items, summary))
    }

    /// Look up and enrich a single item.
    async fn enrich_item(
        &self,
        index: usize,
        mut item: Item,
        config: &EnrichmentConfig,
        options: &ReadOptions,
    ) -> (Item, ItemOutcome) {
        let path = match item.lookup_id() {
            Some(id) => config.document_path(id),
            None => {
                self.diagnostics.missing_identifier(index);
                return (item, ItemOutcome::Skipped);
            }
        };

        let doc = match self.store.read(&path, options).await {
            Ok(doc) => doc,
            Err(e) => {
                self.diagnostics.lookup_failed(&path, &e);
                return (item, ItemOutcome::LookupFailed);
            }
        };

        let margin = margin::compute(&item, &doc, config);
        if !margin.is_finite() {
            self.diagnostics.invalid_margin(&path, margin);
            return (item, ItemOutcome::InvalidMargin);
        }

        item.margin = Some(margin);
        (item, ItemOutcome::Enriched)
    }
}
