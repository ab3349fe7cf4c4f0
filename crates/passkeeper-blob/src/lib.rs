//! Passkeeper blob storage
//!
//! Stores uploaded file contents as plain files under one directory, one
//! file per upload, named `{id}_{filename}`. Contents are written and read
//! in chunks so a transfer never holds a whole file in memory.

pub mod error;
pub mod store;

pub use error::{BlobError, Result};
pub use store::{
    encode_filename, BlobReader, BlobStore, BlobWriter, DEFAULT_CHUNK_SIZE, MAX_BLOB_NAME_LEN,
};
