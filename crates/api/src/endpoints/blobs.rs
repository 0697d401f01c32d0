//! Blob endpoints: upload, read, lifecycle, fork and like.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use blobhub_common::AppResult;
use blobhub_core::{LikeOutcome, NewBlob};
use blobhub_db::entities::{BlobRecord, Visibility};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ListQuery;
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, FileResponse, ok},
};

/// Begin upload request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BeginUploadRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(max = 255))]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub size_bytes: u64,
}

/// Begin upload response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginUploadResponse {
    pub blob: BlobRecord,
    /// Bytes per chunk the client must send.
    pub chunk_size: usize,
}

/// Declare an upload.
async fn begin_upload(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<BeginUploadRequest>,
) -> AppResult<ApiResponse<BeginUploadResponse>> {
    req.validate()?;

    let input = NewBlob {
        title: req.title,
        file_name: req.file_name,
        mime_type: req.mime_type,
        visibility: req.visibility,
    };
    let blob = state
        .blob_service
        .begin_upload(&caller, input, req.size_bytes)
        .await?;

    Ok(ApiResponse::ok(BeginUploadResponse {
        blob,
        chunk_size: state.blob_service.codec().chunk_size(),
    }))
}

/// Store one chunk. The body is the raw chunk bytes.
async fn write_chunk(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path((id, index)): Path<(String, u32)>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    state
        .blob_service
        .write_chunk(&caller, &id, index, &body)
        .await?;
    Ok(ok())
}

/// Seal an upload.
async fn commit_upload(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BlobRecord>> {
    let blob = state.blob_service.commit_upload(&caller, &id).await?;
    Ok(ApiResponse::ok(blob))
}

/// Blob metadata.
async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BlobRecord>> {
    let blob = state.blob_service.get(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(blob))
}

/// Download an active blob.
async fn content(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<FileResponse> {
    let content = state.blob_service.download(viewer.as_ref(), &id).await?;
    Ok(FileResponse {
        bytes: content.bytes.to_vec(),
        mime_type: content.record.mime_type,
        file_name: content.record.file_name,
    })
}

/// Bytes of a soft-deleted blob.
async fn recover(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<FileResponse> {
    let content = state.blob_service.recover(viewer.as_ref(), &id).await?;
    Ok(FileResponse {
        bytes: content.bytes.to_vec(),
        mime_type: content.record.mime_type,
        file_name: content.record.file_name,
    })
}

/// Soft-delete a blob.
async fn soft_delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BlobRecord>> {
    let blob = state.blob_service.soft_delete(&caller, &id).await?;
    Ok(ApiResponse::ok(blob))
}

/// Delete a blob for good, or abort an upload.
async fn hard_delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.blob_service.hard_delete(&caller, &id).await?;
    Ok(ok())
}

/// Fork a blob into the caller's space.
async fn fork(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BlobRecord>> {
    let blob = state.fork_service.fork(&caller, &id, None).await?;
    Ok(ApiResponse::ok(blob))
}

/// Toggle the caller's like.
async fn like(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikeOutcome>> {
    let outcome = state.like_service.toggle_like(&caller, &id).await?;
    Ok(ApiResponse::ok(outcome))
}

/// Whether the caller likes a blob.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedResponse {
    pub liked: bool,
}

/// Like state of the caller on a blob.
async fn liked(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikedResponse>> {
    let liked = state.like_service.has_liked(&caller, &id).await?;
    Ok(ApiResponse::ok(LikedResponse { liked }))
}

/// The caller's blobs.
async fn mine(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<BlobRecord>>> {
    let blobs = state.blob_service.list_mine(&caller, query.limit()).await?;
    Ok(ApiResponse::ok(blobs))
}

/// Most viewed public blobs.
async fn trending(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<BlobRecord>>> {
    let blobs = state.blob_service.list_trending(query.limit()).await?;
    Ok(ApiResponse::ok(blobs))
}

/// Newest public blobs.
async fn feed(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<BlobRecord>>> {
    let blobs = state.blob_service.list_feed(query.limit()).await?;
    Ok(ApiResponse::ok(blobs))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blobs", post(begin_upload))
        .route("/blobs/mine", get(mine))
        .route("/blobs/trending", get(trending))
        .route("/blobs/feed", get(feed))
        .route("/blobs/{id}", get(show).delete(hard_delete))
        .route("/blobs/{id}/chunks/{index}", put(write_chunk))
        .route("/blobs/{id}/commit", post(commit_upload))
        .route("/blobs/{id}/content", get(content))
        .route("/blobs/{id}/recover", get(recover))
        .route("/blobs/{id}/soft-delete", post(soft_delete))
        .route("/blobs/{id}/fork", post(fork))
        .route("/blobs/{id}/like", get(liked).post(like))
}
