//! Application configuration for MarginKit.
//!
//! User config lives at `~/.marginkit/marginkit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MarginKitError, Result};
use crate::types::ValueCalculation;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "marginkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".marginkit";

// ---------------------------------------------------------------------------
// Config structs (matching marginkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// How margins are computed.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Where reference documents are read from.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[enrichment]` section. Immutable for the duration of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Collection holding one reference document per item id.
    #[serde(default = "default_collection_id")]
    pub collection_id: String,

    /// Document field holding the per-unit value.
    #[serde(default = "default_value_field")]
    pub value_field: String,

    /// Document field holding the return rate (0..1).
    #[serde(default = "default_return_rate_field")]
    pub return_rate_field: String,

    /// Formula selection.
    #[serde(default)]
    pub value_calculation: ValueCalculation,

    /// Namespace (project) passed with every read. Falls back to the
    /// store's own project when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            collection_id: default_collection_id(),
            value_field: default_value_field(),
            return_rate_field: default_return_rate_field(),
            value_calculation: ValueCalculation::default(),
            namespace: None,
        }
    }
}

impl EnrichmentConfig {
    /// Check the preconditions every batch relies on.
    ///
    /// An unrecognized formula is not an error here; it computes zero.
    pub fn validate(&self) -> Result<()> {
        if self.collection_id.trim().is_empty() {
            return Err(MarginKitError::config("collection_id must not be empty"));
        }
        let segments: Vec<&str> = self.collection_id.split('/').collect();
        if segments.iter().any(|s| matches!(*s, "" | "." | "..")) {
            return Err(MarginKitError::config(format!(
                "collection_id has an empty or relative path segment: {:?}",
                self.collection_id
            )));
        }
        // collection, or collection/document/subcollection/...
        if segments.len() % 2 == 0 {
            return Err(MarginKitError::config(format!(
                "collection_id must name a collection, got document path {:?}",
                self.collection_id
            )));
        }
        if self.value_field.trim().is_empty() {
            return Err(MarginKitError::config("value_field must not be empty"));
        }
        if self.value_calculation == ValueCalculation::ReturnRate
            && self.return_rate_field.trim().is_empty()
        {
            return Err(MarginKitError::config(
                "return_rate_field must be set when value_calculation is returnRate",
            ));
        }
        Ok(())
    }

    /// Document path for an item id: `<collection_id>/<item_id>`.
    pub fn document_path(&self, item_id: &str) -> String {
        format!("{}/{}", self.collection_id, item_id)
    }
}

fn default_collection_id() -> String {
    "products".into()
}
fn default_value_field() -> String {
    "value".into()
}
fn default_return_rate_field() -> String {
    "return_rate".into()
}

/// Which document store implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Firestore REST API.
    #[default]
    Firestore,
    /// In-process map loaded from a JSON fixtures file.
    Memory,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Firestore project id.
    #[serde(default)]
    pub project_id: String,

    /// Firestore database id.
    #[serde(default = "default_database")]
    pub database: String,

    /// Firestore REST endpoint (overridable for emulators).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the env var holding a bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// JSON fixtures file for the memory backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            project_id: String::new(),
            database: default_database(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token_env: default_token_env(),
            fixtures_path: None,
        }
    }
}

impl StoreConfig {
    /// Parsed Firestore endpoint.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            MarginKitError::config(format!("invalid store base_url {:?}: {e}", self.base_url))
        })
    }
}

fn default_database() -> String {
    "(default)".into()
}
fn default_base_url() -> String {
    "https://firestore.googleapis.com".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_token_env() -> String {
    "MARGINKIT_STORE_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.marginkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MarginKitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.marginkit/marginkit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MarginKitError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MarginKitError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MarginKitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MarginKitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MarginKitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
