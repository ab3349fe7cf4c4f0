use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{BlobError, Result};

/// Chunk size used by downloads.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Longest blob name, in bytes, most filesystems accept as one path component.
pub const MAX_BLOB_NAME_LEN: usize = 255;

/// Directory-backed blob storage.
///
/// Blob names are derived from the owning file's id, so two uploads never
/// share a physical file and the store needs no locking of its own.
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| BlobError::io(&root.to_string_lossy(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical name of the blob holding file `id` uploaded as `filename`.
    pub fn blob_name(id: i64, filename: &str) -> String {
        format!("{}_{}", id, encode_filename(filename))
    }

    /// Whether `filename` yields a valid blob name for every possible id.
    pub fn fits_name(filename: &str) -> bool {
        Self::blob_name(i64::MAX, filename).len() <= MAX_BLOB_NAME_LEN
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Creates (or truncates) a blob and returns a writer appending to it.
    pub async fn create(&self, name: &str) -> Result<BlobWriter> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path_of(name))
            .await
            .map_err(|e| BlobError::io(name, e))?;

        debug!("[Blob] created {}", name);

        Ok(BlobWriter {
            name: name.to_string(),
            file: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Opens a blob for chunked reading.
    pub async fn reader(&self, name: &str, chunk_size: usize) -> Result<BlobReader> {
        if chunk_size == 0 {
            return Err(BlobError::InvalidChunkSize(chunk_size));
        }
        let file = File::open(self.path_of(name))
            .await
            .map_err(|e| BlobError::io(name, e))?;

        Ok(BlobReader {
            name: name.to_string(),
            file,
            buf: vec![0; chunk_size],
            exhausted: false,
        })
    }

    /// Removes a blob. A missing blob is reported as [`BlobError::NotFound`].
    pub async fn remove(&self, name: &str) -> Result<()> {
        fs::remove_file(self.path_of(name))
            .await
            .map_err(|e| BlobError::io(name, e))?;
        debug!("[Blob] removed {}", name);
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        fs::try_exists(self.path_of(name))
            .await
            .map_err(|e| BlobError::io(name, e))
    }
}

/// Appends chunks to a blob in arrival order.
#[derive(Debug)]
pub struct BlobWriter {
    name: String,
    file: Option<BufWriter<File>>,
    written: u64,
}

impl BlobWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BlobError::Finished(self.name.clone()))?;
        file.write_all(chunk)
            .await
            .map_err(|e| BlobError::io(&self.name, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes buffered bytes and syncs the file to disk.
    ///
    /// Returns the total number of bytes written.
    pub async fn finish(&mut self) -> Result<u64> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| BlobError::Finished(self.name.clone()))?;
        file.flush().await.map_err(|e| BlobError::io(&self.name, e))?;
        file.get_ref()
            .sync_all()
            .await
            .map_err(|e| BlobError::io(&self.name, e))?;
        Ok(self.written)
    }
}

/// Reads a blob in fixed-size chunks.
///
/// [`BlobReader::next_chunk`] returns `Ok(None)` exactly once the data is
/// exhausted; I/O failures are always `Err`, so end of data and a broken
/// read can never be confused.
#[derive(Debug)]
pub struct BlobReader {
    name: String,
    file: File,
    buf: Vec<u8>,
    exhausted: bool,
}

impl BlobReader {
    pub fn chunk_size(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next chunk, or `None` once the blob is fully read.
    ///
    /// Every chunk except the last is exactly `chunk_size` bytes long.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.buf.len() {
            match self.file.read(&mut self.buf[filled..]).await {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BlobError::io(&self.name, e)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.buf[..filled])))
    }
}

/// Encodes a client supplied filename so it is safe as a single path
/// component. Ordinary names pass through unchanged.
pub fn encode_filename(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '<' | '>' | ':' | '"' | '/' | '|' | '\\' | '?' | '*' | '%' | '\x00'..='\x1f' | '\x7f'
        ) {
            encoded.push_str(&format!("%{:02X}", c as u8));
        } else {
            encoded.push(c);
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_blob_name_keeps_plain_filenames() {
        assert_eq!(BlobStore::blob_name(12, "report.pdf"), "12_report.pdf");
    }

    #[test]
    fn test_fits_name_counts_encoded_bytes() {
        // i64::MAX has 19 digits, plus the separator.
        assert!(BlobStore::fits_name(&"a".repeat(MAX_BLOB_NAME_LEN - 20)));
        assert!(!BlobStore::fits_name(&"a".repeat(MAX_BLOB_NAME_LEN - 19)));
        assert!(!BlobStore::fits_name(&"/".repeat(100)));
    }

    #[test]
    fn test_encode_filename_blocks_traversal() {
        assert_eq!(encode_filename("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(encode_filename("a\\b"), "a%5Cb");
        assert_eq!(encode_filename("100%"), "100%25");
    }

    #[tokio::test]
    async fn test_write_then_read_in_chunks() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut writer = store.create("1_data.bin").await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 11);

        let mut reader = store.reader("1_data.bin", 4).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_ref(), b"hell");
        assert_eq!(chunks[2].as_ref(), b"ld");
        assert_eq!(chunks.concat(), b"hello world");

        // End of data is sticky.
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_of_chunk_size_ends_cleanly() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let mut writer = store.create("2_even.bin").await.unwrap();
        writer.write(&[7u8; 8]).await.unwrap();
        writer.finish().await.unwrap();

        let mut reader = store.reader("2_even.bin", 4).await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().len(), 4);
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().len(), 4);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_blob_yields_no_chunks() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        store.create("3_empty").await.unwrap().finish().await.unwrap();

        let mut reader = store.reader("3_empty", DEFAULT_CHUNK_SIZE).await.unwrap();
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_and_missing_blobs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        store.create("4_x").await.unwrap().finish().await.unwrap();
        assert!(store.exists("4_x").await.unwrap());

        store.remove("4_x").await.unwrap();
        assert!(!store.exists("4_x").await.unwrap());
        assert!(store.remove("4_x").await.unwrap_err().is_not_found());
        assert!(store.reader("4_x", 16).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_after_finish_fails() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        let mut writer = store.create("5_done").await.unwrap();
        writer.finish().await.unwrap();
        assert!(matches!(
            writer.write(b"late").await,
            Err(BlobError::Finished(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        store.create("6_z").await.unwrap().finish().await.unwrap();
        assert!(matches!(
            store.reader("6_z", 0).await,
            Err(BlobError::InvalidChunkSize(0))
        ));
    }
}
