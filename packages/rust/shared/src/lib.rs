//! Shared types, error model, and configuration for MarginKit.
//!
//! This crate is the foundation depended on by all other MarginKit crates.
//! It provides:
//! - [`MarginKitError`] — the unified error type
//! - Domain types ([`Item`], [`ReferenceDocument`], [`ValueCalculation`])
//! - Configuration ([`AppConfig`], [`EnrichmentConfig`], [`StoreConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentConfig, StoreBackend, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{MarginKitError, Result};
pub use types::{Item, ReferenceDocument, ValueCalculation};
