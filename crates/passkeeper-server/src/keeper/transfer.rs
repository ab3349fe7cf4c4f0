//! Chunked file transfer
//!
//! Uploads arrive as a stream of chunks: the first carries the filename and
//! metadata, every chunk carries payload bytes in order. The metadata row
//! is inserted with `uploaded = false` and flipped only after the blob is
//! fully persisted. Downloads stream the blob back in fixed-size chunks.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use passkeeper_blob::{BlobStore, DEFAULT_CHUNK_SIZE};
use tracing::{debug, info, warn, Span};

use super::{Keeper, KeeperError, Result};
use crate::models::FileMeta;
use crate::storage::{FileStorage, StorageError};

pub const DOWNLOAD_CHUNK_SIZE: usize = DEFAULT_CHUNK_SIZE;

/// One piece of an upload. `filename` and `metadata` are read from the
/// first chunk only.
#[derive(Debug, Clone, Default)]
pub struct UploadChunk {
    pub filename: Option<String>,
    pub metadata: Option<String>,
    pub chunk: Bytes,
}

impl UploadChunk {
    pub fn data(chunk: impl Into<Bytes>) -> Self {
        Self {
            chunk: chunk.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadChunk {
    pub filename: String,
    pub chunk: Bytes,
}

pub type DownloadStream = Pin<Box<dyn Stream<Item = Result<DownloadChunk>> + Send>>;

impl Keeper {
    /// Receives an upload for `owner_id` and returns the new file id.
    ///
    /// If the stream fails, or this future is dropped before completion,
    /// the partial blob and its row are removed.
    pub async fn upload<S>(&self, owner_id: i64, chunks: S) -> Result<i64>
    where
        S: Stream<Item = Result<UploadChunk>> + Send,
    {
        let mut chunks = std::pin::pin!(chunks);

        let first = match chunks.next().await {
            Some(first) => first?,
            None => return Err(KeeperError::InvalidUpload("empty upload stream")),
        };
        let filename = first
            .filename
            .filter(|f| !f.is_empty())
            .ok_or(KeeperError::InvalidUpload("filename is required"))?;
        if !BlobStore::fits_name(&filename) {
            return Err(KeeperError::InvalidUpload("filename is too long"));
        }

        let meta = FileMeta {
            owner_id,
            filename,
            metadata: first.metadata.unwrap_or_default(),
            ..Default::default()
        };
        let id = self.ports.files.add_file(&meta).await?;
        let name = BlobStore::blob_name(id, &meta.filename);

        let mut pending = PendingUpload {
            files: Some(self.ports.files.clone()),
            blobs: self.blobs.clone(),
            id,
            owner_id,
            name: name.clone(),
            span: self.span.clone(),
        };

        let received = async {
            let mut writer = self.blobs.create(&name).await?;
            writer.write(&first.chunk).await?;
            while let Some(chunk) = chunks.next().await {
                writer.write(&chunk?.chunk).await?;
            }
            let size = writer.finish().await?;
            self.ports.files.mark_file_uploaded(id, owner_id).await?;
            Ok::<_, KeeperError>(size)
        }
        .await;

        match received {
            Ok(size) => {
                pending.disarm();
                info!(parent: &self.span, id, owner = owner_id, size, "file uploaded");
                Ok(id)
            }
            Err(e) => {
                warn!(parent: &self.span, id, owner = owner_id, "upload failed: {}", e);
                pending.cleanup().await;
                Err(e)
            }
        }
    }

    /// Opens file `id` of `owner_id` for download.
    ///
    /// Files whose upload never completed are reported as not found. The
    /// returned stream ends after the last byte; dropping it early stops
    /// reading.
    pub async fn download(&self, id: i64, owner_id: i64) -> Result<(FileMeta, DownloadStream)> {
        let file = self.ports.files.file(id, owner_id).await?;
        if !file.uploaded {
            return Err(KeeperError::FileNotFound);
        }

        let name = BlobStore::blob_name(file.id, &file.filename);
        let mut reader = self.blobs.reader(&name, DOWNLOAD_CHUNK_SIZE).await?;
        let filename = file.filename.clone();
        let span = self.span.clone();

        let chunks = stream! {
            let mut sent = 0u64;
            loop {
                match reader.next_chunk().await {
                    Ok(Some(chunk)) => {
                        sent += chunk.len() as u64;
                        yield Ok(DownloadChunk { filename: filename.clone(), chunk });
                    }
                    Ok(None) => {
                        debug!(parent: &span, id, bytes = sent, "download complete");
                        break;
                    }
                    Err(e) => {
                        warn!(parent: &span, id, "download aborted: {}", e);
                        yield Err(KeeperError::from(e));
                        break;
                    }
                }
            }
        };

        Ok((file, Box::pin(chunks)))
    }
}

/// Removes the blob and row of an upload that did not complete.
///
/// Dropped while armed, it finishes the cleanup on a spawned task.
struct PendingUpload {
    files: Option<Arc<dyn FileStorage>>,
    blobs: BlobStore,
    id: i64,
    owner_id: i64,
    name: String,
    span: Span,
}

impl PendingUpload {
    fn disarm(&mut self) {
        self.files = None;
    }

    async fn cleanup(mut self) {
        if let Some(files) = self.files.take() {
            remove_partial(files, self.blobs.clone(), self.id, self.owner_id, &self.name, &self.span)
                .await;
        }
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(files) = self.files.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(parent: &self.span, id = self.id, "no runtime to clean up abandoned upload");
            return;
        };

        let blobs = self.blobs.clone();
        let (id, owner_id) = (self.id, self.owner_id);
        let name = std::mem::take(&mut self.name);
        let span = self.span.clone();
        handle.spawn(async move {
            remove_partial(files, blobs, id, owner_id, &name, &span).await;
        });
    }
}

async fn remove_partial(
    files: Arc<dyn FileStorage>,
    blobs: BlobStore,
    id: i64,
    owner_id: i64,
    name: &str,
    span: &Span,
) {
    match blobs.remove(name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(parent: span, blob = %name, "failed to remove partial blob: {}", e),
    }
    match files.delete_file(id, owner_id).await {
        Ok(()) | Err(StorageError::FileNotExist) => {}
        Err(e) => warn!(parent: span, id, "failed to remove incomplete file row: {}", e),
    }
    debug!(parent: span, id, "incomplete upload removed");
}
