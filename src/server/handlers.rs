use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::error::{DbError, DbResult};
use crate::storage::{BlobStore, ContainerFeed, Database};

#[derive(Clone)]
pub struct SandboxState {
    pub database: Database,
    pub blobs: BlobStore,
}

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(rename = "Documents")]
    pub documents: Vec<Value>,
    #[serde(rename = "_count")]
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ItemParams {
    #[serde(rename = "partitionKey", default)]
    pub partition_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BlobListParams {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct BlobListResponse {
    pub blobs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<String>,
}

/// Runs a storage call on the blocking pool. Queries materialise whole
/// result sets and restores hold the database gate exclusively.
async fn blocking<R, F>(f: F) -> DbResult<R>
where
    F: FnOnce() -> DbResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DbError::InternalError(format!("Task error: {}", e)))?
}

// ==================== Container Handlers ====================

pub async fn list_containers(State(state): State<SandboxState>) -> Json<ContainerFeed> {
    Json(state.database.list_containers())
}

pub async fn clear_container(
    State(state): State<SandboxState>,
    Path(name): Path<String>,
) -> Result<StatusCode, DbError> {
    let container = state.database.container_handle(&name)?;
    blocking(move || container.clear(&CancellationToken::new())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn query_container(
    State(state): State<SandboxState>,
    Path(name): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, DbError> {
    run_query(&state, &name, params.q).await
}

pub async fn query_container_post(
    State(state): State<SandboxState>,
    Path(name): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, DbError> {
    run_query(&state, &name, req.query).await
}

async fn run_query(
    state: &SandboxState,
    name: &str,
    query: Option<String>,
) -> Result<Json<QueryResponse>, DbError> {
    let container = state.database.container_handle(name)?;
    let documents = blocking(move || {
        container.query_json(query.as_deref(), &CancellationToken::new())
    })
    .await?;
    Ok(Json(QueryResponse {
        count: documents.len(),
        documents,
    }))
}

pub async fn upsert_item(
    State(state): State<SandboxState>,
    Path(name): Path<String>,
    Json(document): Json<Value>,
) -> Result<Json<Value>, DbError> {
    let container = state.database.container_handle(&name)?;
    container.upsert_json(document.clone(), &CancellationToken::new())?;
    Ok(Json(document))
}

pub async fn read_item(
    State(state): State<SandboxState>,
    Path((name, id)): Path<(String, String)>,
    Query(params): Query<ItemParams>,
) -> Result<Json<Value>, DbError> {
    let container = state.database.container_handle(&name)?;
    let document = container.read_json(&id, &params.partition_key, &CancellationToken::new())?;
    Ok(Json(document))
}

pub async fn delete_item(
    State(state): State<SandboxState>,
    Path((name, id)): Path<(String, String)>,
    Query(params): Query<ItemParams>,
) -> Result<StatusCode, DbError> {
    let container = state.database.container_handle(&name)?;
    container.delete_item(&id, &params.partition_key, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_container_snapshots(
    State(state): State<SandboxState>,
    Path(name): Path<String>,
) -> Result<Json<SnapshotListResponse>, DbError> {
    let container = state.database.container_handle(&name)?;
    Ok(Json(SnapshotListResponse {
        snapshots: container.snapshot_names(),
    }))
}

pub async fn create_container_snapshot(
    State(state): State<SandboxState>,
    Path((name, snapshot)): Path<(String, String)>,
) -> Result<StatusCode, DbError> {
    let container = state.database.container_handle(&name)?;
    container.create_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::CREATED)
}

pub async fn reset_container_snapshot(
    State(state): State<SandboxState>,
    Path((name, snapshot)): Path<(String, String)>,
) -> Result<StatusCode, DbError> {
    let container = state.database.container_handle(&name)?;
    blocking(move || container.reset_to_snapshot(&snapshot, &CancellationToken::new())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_container_snapshot(
    State(state): State<SandboxState>,
    Path((name, snapshot)): Path<(String, String)>,
) -> Result<StatusCode, DbError> {
    let container = state.database.container_handle(&name)?;
    container.delete_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Database Handlers ====================

pub async fn list_database_snapshots(
    State(state): State<SandboxState>,
) -> Json<SnapshotListResponse> {
    Json(SnapshotListResponse {
        snapshots: state.database.snapshot_names(),
    })
}

pub async fn create_database_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    let database = state.database.clone();
    blocking(move || database.create_snapshot(&snapshot, &CancellationToken::new())).await?;
    Ok(StatusCode::CREATED)
}

pub async fn reset_database_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    let database = state.database.clone();
    blocking(move || database.reset_to_snapshot(&snapshot, &CancellationToken::new())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_database_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    state
        .database
        .delete_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_database(State(state): State<SandboxState>) -> Result<StatusCode, DbError> {
    let database = state.database.clone();
    blocking(move || database.clear(&CancellationToken::new())).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Blob Handlers ====================

pub async fn list_blobs(
    State(state): State<SandboxState>,
    Query(params): Query<BlobListParams>,
) -> Json<BlobListResponse> {
    Json(BlobListResponse {
        blobs: state.blobs.list(&params.prefix),
    })
}

pub async fn get_blob(
    State(state): State<SandboxState>,
    Path(path): Path<String>,
) -> Result<Response, DbError> {
    let data = state.blobs.get(&path, &CancellationToken::new())?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data).into_response())
}

pub async fn put_blob(
    State(state): State<SandboxState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<StatusCode, DbError> {
    state
        .blobs
        .put(&path, body.to_vec(), &CancellationToken::new())?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_blob(
    State(state): State<SandboxState>,
    Path(path): Path<String>,
) -> Result<StatusCode, DbError> {
    state.blobs.delete(&path, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_blobs(State(state): State<SandboxState>) -> Result<StatusCode, DbError> {
    state.blobs.clear(&CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_blob_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    state
        .blobs
        .create_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::CREATED)
}

pub async fn reset_blob_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    state
        .blobs
        .reset_to_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_blob_snapshot(
    State(state): State<SandboxState>,
    Path(snapshot): Path<String>,
) -> Result<StatusCode, DbError> {
    state
        .blobs
        .delete_snapshot(&snapshot, &CancellationToken::new())?;
    Ok(StatusCode::NO_CONTENT)
}
