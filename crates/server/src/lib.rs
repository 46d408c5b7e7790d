use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{create_record, delete_record, health, list_records, update_record, ApiContext};
use shared::{
    domain::{RecordId, Student, StudentFields, StudentPatch},
    error::{ApiError, ErrorCode},
    protocol::{RecordIdQuery, SuccessResponse, HEALTH_ROUTE, RECORDS_ROUTE},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod config;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiContext,
}

impl AppState {
    pub fn new(api: ApiContext) -> Self {
        Self { api }
    }
}

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(HEALTH_ROUTE, get(healthz))
        .route(
            RECORDS_ROUTE,
            get(http_list_records)
                .post(http_create_record)
                .put(http_update_record)
                .delete(http_delete_record),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    health(&state.api)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(e)))?;
    Ok("ok")
}

async fn http_list_records(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Student>>> {
    let records = list_records(&state.api).await.map_err(reject)?;
    Ok(Json(records))
}

async fn http_create_record(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StudentFields>, JsonRejection>,
) -> HttpResult<Json<Student>> {
    let Json(fields) = body.map_err(malformed_body)?;
    let record = create_record(&state.api, fields).await.map_err(reject)?;
    Ok(Json(record))
}

async fn http_update_record(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RecordIdQuery>, QueryRejection>,
    body: Result<Json<StudentPatch>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let Query(q) = query.map_err(malformed_query)?;
    let id = require_id(q).map_err(reject)?;
    let Json(patch) = body.map_err(malformed_body)?;
    update_record(&state.api, &id, patch).await.map_err(reject)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn http_delete_record(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RecordIdQuery>, QueryRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let Query(q) = query.map_err(malformed_query)?;
    let id = require_id(q).map_err(reject)?;
    delete_record(&state.api, &id).await.map_err(reject)?;
    Ok(Json(SuccessResponse::ok()))
}

fn require_id(q: RecordIdQuery) -> Result<RecordId, ApiError> {
    q.id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(RecordId)
        .ok_or_else(|| ApiError::missing_parameter("id"))
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Validation | ErrorCode::MissingParameter => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::StoreUnavailable | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

fn malformed_body(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    (
        rejection.status(),
        Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
    )
}

fn malformed_query(rejection: QueryRejection) -> (StatusCode, Json<ApiError>) {
    (
        rejection.status(),
        Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
    )
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
