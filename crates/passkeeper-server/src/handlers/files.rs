//! Streaming file endpoints.
//!
//! An upload is the request body itself; `filename` and `metadata` travel
//! in the query string and form the leading chunk. Downloads stream the
//! blob back as the response body.

use axum::{
    body::Body,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use serde::Deserialize;

use super::IdResponse;
use crate::auth::Identity;
use crate::config::AppState;
use crate::error::{ApiError, Result};
use crate::keeper::{KeeperError, UploadChunk};

pub const FILENAME_HEADER: HeaderName = HeaderName::from_static("x-filename");

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
    pub metadata: Option<String>,
}

/// POST /files?filename=..&metadata=..
pub async fn upload_file(
    State(state): State<AppState>,
    identity: Identity,
    params: std::result::Result<Query<UploadParams>, QueryRejection>,
    body: Body,
) -> Result<Json<IdResponse>> {
    let Query(params) = params?;
    let header = UploadChunk {
        filename: params.filename,
        metadata: params.metadata,
        chunk: Bytes::new(),
    };
    let payload = body
        .into_data_stream()
        .map_ok(UploadChunk::data)
        .map_err(|e| KeeperError::Stream(e.to_string()));
    let chunks = stream::once(async move { Ok(header) }).chain(payload);

    let id = state.keeper.upload(identity.uid(), chunks).await?;
    Ok(Json(IdResponse { id }))
}

/// GET /files/{id}
pub async fn download_file(
    State(state): State<AppState>,
    identity: Identity,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Response> {
    let Path(id) = id?;
    let (file, chunks) = state.keeper.download(id, identity.uid()).await?;

    let filename = header_safe(&file.filename);
    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", filename.replace('"', "_")).as_bytes(),
    )
    .map_err(|_| ApiError::Internal)?;
    let raw_name = HeaderValue::from_bytes(filename.as_bytes()).map_err(|_| ApiError::Internal)?;

    let body = Body::from_stream(chunks.map_ok(|c| c.chunk));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (FILENAME_HEADER, raw_name),
        ],
        body,
    )
        .into_response())
}

/// Replaces bytes a header value cannot carry.
fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect()
}
