use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{RecordId, Student, StudentFields, StudentPatch},
    error::{ApiError, ErrorCode},
};
use storage::{DocumentPath, DocumentStore};
use tracing::{error, info, warn};

/// Collection holding one document per student, keyed by record id.
pub const RECORDS_COLLECTION: &str = "records";

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn DocumentStore>,
}

impl ApiContext {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

/// Every stored record, in the store's iteration order. Documents that no longer decode
/// as a record are skipped rather than failing the whole listing.
pub async fn list_records(ctx: &ApiContext) -> Result<Vec<Student>, ApiError> {
    let path = collection_path()?;
    let Some(value) = ctx.store.get(&path).await.map_err(unavailable)? else {
        return Ok(Vec::new());
    };

    let Value::Object(documents) = value else {
        error!(%path, "records collection is not an object of documents");
        return Err(ApiError::new(
            ErrorCode::Internal,
            "records collection is corrupt",
        ));
    };

    let mut records = Vec::with_capacity(documents.len());
    for (key, document) in documents {
        match serde_json::from_value::<StudentFields>(document) {
            Ok(fields) => records.push(Student::from_fields(RecordId(key), fields)),
            Err(err) => warn!(id = %key, error = %err, "skipping malformed record"),
        }
    }
    Ok(records)
}

/// Stores `fields` under a freshly generated id. The fields are persisted as given.
pub async fn create_record(ctx: &ApiContext, fields: StudentFields) -> Result<Student, ApiError> {
    let document = serde_json::to_value(&fields).map_err(encode_failure)?;
    let key = ctx
        .store
        .push(RECORDS_COLLECTION, document)
        .await
        .map_err(unavailable)?;
    info!(id = %key, "record created");
    Ok(Student::from_fields(RecordId(key), fields))
}

/// Merges the fields present in `patch` into an existing record. Fails with `NotFound`
/// instead of letting the store create a partial document under an unknown id.
pub async fn update_record(
    ctx: &ApiContext,
    id: &RecordId,
    patch: StudentPatch,
) -> Result<(), ApiError> {
    let path = record_path(id)?;
    ensure_record_exists(ctx, &path, id).await?;

    if patch.is_empty() {
        return Ok(());
    }

    let Value::Object(fields) = serde_json::to_value(&patch).map_err(encode_failure)? else {
        return Err(ApiError::new(
            ErrorCode::Internal,
            "record patch did not encode as an object",
        ));
    };
    ctx.store.update(&path, fields).await.map_err(unavailable)?;
    info!(%id, "record updated");
    Ok(())
}

/// Deleting an id that does not exist succeeds.
pub async fn delete_record(ctx: &ApiContext, id: &RecordId) -> Result<(), ApiError> {
    let path = record_path(id)?;
    ctx.store.remove(&path).await.map_err(unavailable)?;
    info!(%id, "record deleted");
    Ok(())
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.store.health_check().await.map_err(unavailable)
}

async fn ensure_record_exists(
    ctx: &ApiContext,
    path: &DocumentPath,
    id: &RecordId,
) -> Result<(), ApiError> {
    match ctx.store.get(path).await.map_err(unavailable)? {
        Some(_) => Ok(()),
        None => Err(ApiError::new(
            ErrorCode::NotFound,
            format!("record {id} not found"),
        )),
    }
}

pub fn record_path(id: &RecordId) -> Result<DocumentPath, ApiError> {
    DocumentPath::document(RECORDS_COLLECTION, id.as_str())
        .map_err(|err| ApiError::new(ErrorCode::Validation, format!("invalid id: {err}")))
}

fn collection_path() -> Result<DocumentPath, ApiError> {
    DocumentPath::collection(RECORDS_COLLECTION)
        .map_err(|err| ApiError::new(ErrorCode::Internal, err.to_string()))
}

fn unavailable(err: anyhow::Error) -> ApiError {
    let detail = format!("{err:#}");
    error!(error = %detail, "document store call failed");
    ApiError::store_unavailable(err.to_string())
}

fn encode_failure(err: serde_json::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("failed to encode record: {err}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
