//! Firestore REST backend.
//!
//! Reads `GET {base}/v1/projects/{project}/databases/{database}/documents/{path}`
//! and flattens Firestore's typed values (`{"integerValue": "3"}`) into plain
//! JSON so margin formulas can address fields by name.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use marginkit_shared::{MarginKitError, ReferenceDocument, Result, StoreConfig};

use crate::{DocumentStore, ReadOptions, StoreError, StoreResult};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("MarginKit/", env!("CARGO_PKG_VERSION"));

/// [`DocumentStore`] over the Firestore REST API.
pub struct FirestoreStore {
    client: Client,
    base_url: Url,
    project_id: String,
    database: String,
    token: Option<String>,
}

impl FirestoreStore {
    /// Build a client from the `[store]` config.
    ///
    /// The bearer token, if any, is read once from the env var named by
    /// `token_env`.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(MarginKitError::config(
                "store.project_id is required for the firestore backend",
            ));
        }

        let base_url = config.base_url()?;
        if base_url.cannot_be_a_base() {
            return Err(MarginKitError::config(format!(
                "store base_url cannot be used as a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MarginKitError::Store(format!("failed to build HTTP client: {e}")))?;

        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            debug!(env = %config.token_env, "no store token set, sending unauthenticated requests");
        }

        Ok(Self {
            client,
            base_url,
            project_id: config.project_id.clone(),
            database: config.database.clone(),
            token,
        })
    }

    /// REST URL for `path`. The path must name a document: an even number of
    /// segments, none of them empty, `.` or `..`. URL normalization would
    /// otherwise resolve relative segments to a different document.
    fn document_url(&self, project: &str, path: &str) -> StoreResult<Url> {
        let segments: Vec<&str> = path.split('/').collect();
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(StoreError::Malformed(format!(
                "{path}: invalid path segment {bad:?}"
            )));
        }
        if segments.len() % 2 != 0 {
            return Err(StoreError::Malformed(format!(
                "{path}: not a document path"
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                project,
                "databases",
                self.database.as_str(),
                "documents",
            ])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn read(&self, path: &str, options: &ReadOptions) -> StoreResult<ReferenceDocument> {
        let project = options.namespace.as_deref().unwrap_or(&self.project_id);
        let url = self.document_url(project, path)?;

        debug!(%url, "reading document");

        let mut request = self.client.get(url.as_str());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("{path}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("{path}: body read failed: {e}")))?;

        parse_document(&body).map_err(|e| match e {
            StoreError::Malformed(msg) => StoreError::Malformed(format!("{path}: {msg}")),
            other => other,
        })
    }
}

// ---------------------------------------------------------------------------
// Value decoding
// ---------------------------------------------------------------------------

/// Decode a Firestore document body into a [`ReferenceDocument`].
fn parse_document(body: &str) -> StoreResult<ReferenceDocument> {
    let raw: Value =
        serde_json::from_str(body).map_err(|e| StoreError::Malformed(e.to_string()))?;

    let fields = match raw.get("fields") {
        None => return Ok(ReferenceDocument::default()),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(StoreError::Malformed(format!(
                "`fields` must be an object, got {other}"
            )));
        }
    };

    let mut document = ReferenceDocument::default();
    for (name, value) in fields {
        document.fields.insert(name.clone(), decode_value(value)?);
    }
    Ok(document)
}

/// Flatten one typed value (`{"<kind>Value": ...}`) into plain JSON.
fn decode_value(value: &Value) -> StoreResult<Value> {
    let Some((kind, inner)) = value
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
    else {
        return Err(StoreError::Malformed(format!(
            "expected a typed value, got {value}"
        )));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue"
        | "geoPointValue" => Ok(inner.clone()),
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| StoreError::Malformed(format!("bad integerValue {s:?}"))),
            Value::Number(_) => Ok(inner.clone()),
            other => Err(StoreError::Malformed(format!("bad integerValue {other}"))),
        },
        // "NaN" / "Infinity" arrive as strings and stay strings
        "doubleValue" => Ok(inner.clone()),
        "mapValue" => {
            let mut map = serde_json::Map::new();
            if let Some(Value::Object(fields)) = inner.get("fields") {
                for (name, v) in fields {
                    map.insert(name.clone(), decode_value(v)?);
                }
            }
            Ok(Value::Object(map))
        }
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<StoreResult<Vec<_>>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        other => Err(StoreError::Malformed(format!("unknown value type {other}"))),
    }
}
