//! Document store access for reference data.
//!
//! The enricher only ever sees [`DocumentStore`]: one asynchronous
//! read-by-path. Backends:
//! - [`FirestoreStore`] — Firestore REST API over `reqwest`
//! - [`MemoryStore`] — in-process map, loaded from JSON fixtures or built in tests
//!
//! [`connect`] is the single place a backend is chosen and constructed.

mod firestore;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use marginkit_shared::{MarginKitError, ReferenceDocument, Result, StoreBackend, StoreConfig};

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single read.
///
/// Callers that only need "did it work" can treat every variant the same.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No document exists at the path.
    #[error("document not found: {path}")]
    NotFound { path: String },

    /// The store answered with a non-success status other than 404.
    #[error("{path}: HTTP {status}")]
    Status { path: String, status: u16 },

    /// The request never produced a response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The path does not name a document, or the response could not be
    /// decoded into one.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result of a single store read.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Per-read options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Namespace (project) to read from; `None` uses the store's default.
    pub namespace: Option<String>,
}

impl ReadOptions {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }
}

/// Read-only access to reference documents keyed by `<collection>/<id>`.
///
/// Implementations must be safe to share across concurrent reads.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Read the document at `path`.
    async fn read(&self, path: &str, options: &ReadOptions) -> StoreResult<ReferenceDocument>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a ready store from configuration.
pub fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(config)?),
        StoreBackend::Memory => {
            let path = config.fixtures_path.as_deref().ok_or_else(|| {
                MarginKitError::config("store.fixtures_path is required for the memory backend")
            })?;
            Arc::new(MemoryStore::load(path)?)
        }
    };

    info!(backend = store.name(), "document store ready");
    Ok(store)
}
