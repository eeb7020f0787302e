//! In-process document store.
//!
//! Serves documents from a map keyed by full path. Used by the CLI's
//! `memory` backend (fixtures file) and by tests, which can also inject
//! per-path failures and latencies.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use marginkit_shared::{MarginKitError, ReferenceDocument, Result};

use crate::{DocumentStore, ReadOptions, StoreError, StoreResult};

/// Map-backed [`DocumentStore`].
///
/// Namespaces are ignored: every read resolves against the same map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: HashMap<String, ReferenceDocument>,
    failures: HashMap<String, StoreError>,
    delays: HashMap<String, Duration>,
    reads: AtomicUsize,
    read_paths: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a fixtures object: `{ "<collection>/<id>": { "<field>": value, ... } }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Map<String, Value>> = serde_json::from_str(json)
            .map_err(|e| MarginKitError::parse(format!("invalid store fixtures: {e}")))?;

        let mut store = Self::new();
        for (path, fields) in raw {
            store.insert(
                path,
                ReferenceDocument {
                    fields: fields.into_iter().collect(),
                },
            );
        }
        Ok(store)
    }

    /// Load a fixtures file (see [`MemoryStore::from_json`]).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MarginKitError::io(path, e))?;
        let store = Self::from_json(&content)?;
        debug!(?path, documents = store.documents.len(), "loaded store fixtures");
        Ok(store)
    }

    pub fn insert(&mut self, path: impl Into<String>, document: ReferenceDocument) {
        self.documents.insert(path.into(), document);
    }

    /// Builder-style [`MemoryStore::insert`].
    pub fn with_document(mut self, path: impl Into<String>, document: ReferenceDocument) -> Self {
        self.insert(path, document);
        self
    }

    /// Make every read of `path` fail with `error`.
    pub fn fail_path(mut self, path: impl Into<String>, error: StoreError) -> Self {
        self.failures.insert(path.into(), error);
        self
    }

    /// Make every read of `path` take at least `delay`.
    pub fn delay_path(mut self, path: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(path.into(), delay);
        self
    }

    /// Number of reads issued so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Paths read so far, in issue order.
    pub fn read_paths(&self) -> Vec<String> {
        self.read_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, path: &str, _options: &ReadOptions) -> StoreResult<ReferenceDocument> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_string());

        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(error) = self.failures.get(path) {
            return Err(error.clone());
        }

        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_inserted_document() {
        let store = MemoryStore::new().with_document(
            "products/sku-1",
            ReferenceDocument::new().with_field("value", 10),
        );

        let doc = store
            .read("products/sku-1", &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(doc.field("value"), Some(&Value::from(10)));
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.read_paths(), vec!["products/sku-1".to_string()]);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .read("products/nope", &ReadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                path: "products/nope".into()
            }
        );
    }

    #[tokio::test]
    async fn injected_failure_wins_over_document() {
        let store = MemoryStore::new()
            .with_document("products/sku-1", ReferenceDocument::new())
            .fail_path("products/sku-1", StoreError::Transport("reset".into()));

        let err = store
            .read("products/sku-1", &ReadOptions::in_namespace("other"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Transport("reset".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn injected_delay_is_applied() {
        let store = MemoryStore::new()
            .with_document("products/slow", ReferenceDocument::new())
            .delay_path("products/slow", Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        store
            .read("products/slow", &ReadOptions::default())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn fixtures_parse() {
        let store = MemoryStore::from_json(
            r#"{
                "products/sku-1": {"value": 10, "return_rate": 0.1},
                "products/sku-2": {"value": "7.5"}
            }"#,
        )
        .unwrap();
        assert_eq!(store.documents.len(), 2);
        assert_eq!(
            store.documents["products/sku-2"].field("value"),
            Some(&Value::from("7.5"))
        );
    }

    #[test]
    fn fixtures_reject_non_object_documents() {
        let err = MemoryStore::from_json(r#"{"products/sku-1": 10}"#).unwrap_err();
        assert!(matches!(err, MarginKitError::Parse { .. }));
    }
}
