use std::fmt;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

mod keys;
mod memory;
mod path;
mod remote;
mod sqlite;

pub use keys::new_push_key;
pub use memory::MemoryDocumentStore;
pub use path::{validate_segment, DocumentPath, PathError};
pub use remote::RemoteDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// A key/value document store addressed by `collection` and `collection/key` paths.
///
/// Semantics follow the hosted realtime store the service was written against:
/// - `get` on a collection yields an object of `key -> document`, or `None` when empty.
/// - `set` replaces the value at the path; writing `null` deletes it.
/// - `update` merges top-level fields into the value at the path, creating it when
///   missing. A `null` field deletes that field.
/// - `remove` is idempotent.
/// - `push` stores a document under a freshly generated key and returns the key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>>;

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<()>;

    async fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()>;

    async fn remove(&self, path: &DocumentPath) -> Result<()>;

    async fn push(&self, collection: &str, value: Value) -> Result<String>;

    async fn health_check(&self) -> Result<()>;
}

/// Connection parameters of the hosted document store. Built once at startup and
/// handed to [`RemoteDocumentStore::new`].
#[derive(Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub endpoint: Option<String>,
    pub project_id: Option<String>,
    pub access_key: Option<String>,
}

impl StoreConfig {
    /// Explicit endpoint if configured, otherwise the default database URL derived from
    /// the project id.
    pub fn resolved_endpoint(&self) -> Result<Url> {
        let raw = match (non_empty(&self.endpoint), non_empty(&self.project_id)) {
            (Some(endpoint), _) => endpoint.to_string(),
            (None, Some(project_id)) => format!("https://{project_id}-default-rtdb.firebaseio.com/"),
            (None, None) => {
                return Err(anyhow!(
                    "remote store needs either an endpoint or a project id"
                ))
            }
        };

        let mut url = Url::parse(&raw).map_err(|e| anyhow!("invalid store endpoint '{raw}': {e}"))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn access_key(&self) -> Option<&str> {
        non_empty(&self.access_key)
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("access_key", &self.access_key().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Applies `fields` to `current` with `DocumentStore::update` semantics. Returns
/// `None` when nothing is left, so the caller drops the document.
pub(crate) fn merge_fields(current: Option<Value>, fields: Map<String, Value>) -> Option<Value> {
    let mut merged = match current {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (field, value) in fields {
        if value.is_null() {
            merged.remove(&field);
        } else {
            merged.insert(field, value);
        }
    }
    (!merged.is_empty()).then_some(Value::Object(merged))
}

pub(crate) fn expect_children(path: &DocumentPath, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(children) => {
            for key in children.keys() {
                validate_segment(key)?;
            }
            Ok(children)
        }
        Value::Null => Ok(Map::new()),
        other => Err(anyhow!(
            "collection '{path}' can only hold an object of documents, got {other}"
        )),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
