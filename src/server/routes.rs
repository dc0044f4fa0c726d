use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::*;
use crate::storage::{BlobStore, Database};

pub fn create_router(database: Database, blobs: BlobStore) -> Router {
    let state = SandboxState { database, blobs };

    Router::new()
        // Container routes
        .route("/containers", get(list_containers))
        .route("/containers/{name}", delete(clear_container))
        .route(
            "/containers/{name}/query",
            get(query_container).post(query_container_post),
        )
        .route("/containers/{name}/items", put(upsert_item))
        .route(
            "/containers/{name}/items/{id}",
            get(read_item).delete(delete_item),
        )
        .route(
            "/containers/{name}/snapshots",
            get(list_container_snapshots),
        )
        .route(
            "/containers/{name}/snapshots/{snapshot}",
            post(create_container_snapshot).delete(delete_container_snapshot),
        )
        .route(
            "/containers/{name}/snapshots/{snapshot}/reset",
            post(reset_container_snapshot),
        )
        // Database routes
        .route("/database", delete(clear_database))
        .route("/snapshots", get(list_database_snapshots))
        .route(
            "/snapshots/{snapshot}",
            post(create_database_snapshot).delete(delete_database_snapshot),
        )
        .route("/snapshots/{snapshot}/reset", post(reset_database_snapshot))
        // Blob routes
        .route("/blobs", get(list_blobs).delete(clear_blobs))
        .route(
            "/blobs/{*path}",
            get(get_blob).put(put_blob).delete(delete_blob),
        )
        .route(
            "/blob-snapshots/{snapshot}",
            post(create_blob_snapshot).delete(delete_blob_snapshot),
        )
        .route(
            "/blob-snapshots/{snapshot}/reset",
            post(reset_blob_snapshot),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
