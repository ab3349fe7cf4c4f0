#![allow(dead_code)]

use std::sync::Arc;

use passkeeper_blob::BlobStore;
use passkeeper_server::keeper::{Keeper, StoragePorts};
use passkeeper_server::storage::{RetryPolicy, SqlStorage, UserStorage};
use tempfile::TempDir;
use tracing::Span;

pub async fn storage() -> (TempDir, Arc<SqlStorage>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.sqlite").display());
    let storage = SqlStorage::connect(&url, 2, Span::none())
        .await
        .unwrap()
        .with_retry_policy(RetryPolicy::no_retry());
    (dir, Arc::new(storage))
}

pub async fn keeper() -> (TempDir, Arc<SqlStorage>, Keeper) {
    let (dir, storage) = storage().await;
    let blobs = BlobStore::open(dir.path().join("blobs")).await.unwrap();
    let keeper = Keeper::new(StoragePorts::shared(storage.clone()), blobs, Span::none());
    (dir, storage, keeper)
}

pub async fn user(storage: &SqlStorage, email: &str) -> i64 {
    storage.create_user(email, "not-a-real-hash").await.unwrap().id
}

pub async fn file_rows(storage: &SqlStorage) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM files")
        .fetch_one(storage.pool())
        .await
        .unwrap()
}
