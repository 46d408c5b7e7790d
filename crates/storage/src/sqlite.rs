use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteConnection,
};

use crate::{expect_children, keys::new_push_key, merge_fields, DocumentPath, DocumentStore};

/// Documents kept in a single SQLite table, one row per `(collection, key)`.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);

        // Every connection to `sqlite::memory:` opens its own empty database, so an
        // in-memory store must stay on one connection that is never recycled.
        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>> {
        let mut conn = self.pool.acquire().await?;
        match path.key() {
            Some(key) => load_document(&mut conn, path.collection_name(), key).await,
            None => {
                let rows = sqlx::query(
                    "SELECT doc_key, body FROM documents WHERE collection = ? ORDER BY doc_key",
                )
                .bind(path.collection_name())
                .fetch_all(&mut *conn)
                .await
                .with_context(|| format!("failed to list '{path}'"))?;

                if rows.is_empty() {
                    return Ok(None);
                }

                let mut documents = Map::with_capacity(rows.len());
                for row in rows {
                    let key: String = row.try_get("doc_key")?;
                    let body: String = row.try_get("body")?;
                    documents.insert(key, decode_body(path, &body)?);
                }
                Ok(Some(Value::Object(documents)))
            }
        }
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        match path.key() {
            Some(key) => {
                write_document(&mut tx, path.collection_name(), key, &value).await?;
            }
            None => {
                let children = expect_children(path, value)?;
                sqlx::query("DELETE FROM documents WHERE collection = ?")
                    .bind(path.collection_name())
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("failed to clear '{path}'"))?;
                for (key, doc) in children {
                    write_document(&mut tx, path.collection_name(), &key, &doc).await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        match path.key() {
            Some(key) => {
                let current = load_document(&mut tx, path.collection_name(), key).await?;
                let merged = merge_fields(current, fields).unwrap_or(Value::Null);
                write_document(&mut tx, path.collection_name(), key, &merged).await?;
            }
            None => {
                for (key, doc) in expect_children(path, Value::Object(fields))? {
                    write_document(&mut tx, path.collection_name(), &key, &doc).await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, path: &DocumentPath) -> Result<()> {
        let query = match path.key() {
            Some(key) => sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_key = ?")
                .bind(path.collection_name())
                .bind(key),
            None => sqlx::query("DELETE FROM documents WHERE collection = ?")
                .bind(path.collection_name()),
        };
        query
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove '{path}'"))?;
        Ok(())
    }

    async fn push(&self, collection: &str, value: Value) -> Result<String> {
        if value.is_null() {
            return Err(anyhow!("cannot push null into '{collection}'"));
        }
        DocumentPath::collection(collection)?;
        let key = new_push_key();
        let mut conn = self.pool.acquire().await?;
        write_document(&mut conn, collection, &key, &value).await?;
        Ok(key)
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

async fn load_document(
    conn: &mut SqliteConnection,
    collection: &str,
    key: &str,
) -> Result<Option<Value>> {
    let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND doc_key = ?")
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("failed to load '{collection}/{key}'"))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let body: String = row.try_get("body")?;
    serde_json::from_str(&body)
        .map(Some)
        .with_context(|| format!("corrupt document body at '{collection}/{key}'"))
}

/// Upserts the document, or deletes it when `value` is null.
async fn write_document(
    conn: &mut SqliteConnection,
    collection: &str,
    key: &str,
    value: &Value,
) -> Result<()> {
    if value.is_null() {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_key = ?")
            .bind(collection)
            .bind(key)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to delete '{collection}/{key}'"))?;
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO documents (collection, doc_key, body)
        VALUES (?, ?, ?)
        ON CONFLICT (collection, doc_key)
        DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(collection)
    .bind(key)
    .bind(value.to_string())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to write '{collection}/{key}'"))?;
    Ok(())
}

fn decode_body(path: &DocumentPath, body: &str) -> Result<Value> {
    serde_json::from_str(body).with_context(|| format!("corrupt document body under '{path}'"))
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(parent) = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
    else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) {
        return None;
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?
        .split('?')
        .next()
        .unwrap_or_default();

    (!path.is_empty()).then(|| PathBuf::from(path))
}
