use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::{expect_children, keys::new_push_key, merge_fields, DocumentPath, DocumentStore};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
        let guard = self.collections.read().await;
        let Some(documents) = guard.get(path.collection_name()) else {
            return Ok(None);
        };
        Ok(match path.key() {
            Some(key) => documents.get(key).cloned(),
            None if documents.is_empty() => None,
            None => Some(Value::Object(
                documents
                    .iter()
                    .map(|(key, doc)| (key.clone(), doc.clone()))
                    .collect(),
            )),
        })
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<()> {
        let mut guard = self.collections.write().await;
        match path.key() {
            Some(key) => {
                let documents = guard.entry(path.collection_name().to_string()).or_default();
                if value.is_null() {
                    documents.remove(key);
                } else {
                    documents.insert(key.to_string(), value);
                }
            }
            None => {
                let children = expect_children(path, value)?;
                guard.insert(
                    path.collection_name().to_string(),
                    children
                        .into_iter()
                        .filter(|(_, doc)| !doc.is_null())
                        .collect(),
                );
            }
        }
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()> {
        let mut guard = self.collections.write().await;
        let documents = guard.entry(path.collection_name().to_string()).or_default();
        match path.key() {
            Some(key) => {
                if let Some(merged) = merge_fields(documents.remove(key), fields) {
                    documents.insert(key.to_string(), merged);
                }
            }
            None => {
                for (key, doc) in expect_children(path, Value::Object(fields))? {
                    if doc.is_null() {
                        documents.remove(&key);
                    } else {
                        documents.insert(key, doc);
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &DocumentPath) -> Result<()> {
        let mut guard = self.collections.write().await;
        match path.key() {
            Some(key) => {
                if let Some(documents) = guard.get_mut(path.collection_name()) {
                    documents.remove(key);
                }
            }
            None => {
                guard.remove(path.collection_name());
            }
        }
        Ok(())
    }

    async fn push(&self, collection: &str, value: Value) -> Result<String> {
        if value.is_null() {
            return Err(anyhow!("cannot push null into '{collection}'"));
        }
        let path = DocumentPath::collection(collection)?;
        let key = new_push_key();
        self.collections
            .write()
            .await
            .entry(path.collection_name().to_string())
            .or_default()
            .insert(key.clone(), value);
        Ok(key)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
