//! Storage Ports
//!
//! One capability trait per kind of record. The keeper and the auth service
//! only ever see these traits; [`sql::SqlStorage`] implements all of them.

pub mod retry;
pub mod sql;

use async_trait::async_trait;
use std::io;
use thiserror::Error;

use crate::models::{Card, EntityKind, FileMeta, Password, Text, User};

pub use retry::{retry, RetryPolicy};
pub use sql::SqlStorage;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Stable storage error vocabulary.
///
/// Backend failures that are not one of the domain conditions stay wrapped
/// in [`StorageError::Database`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user does not exist")]
    UserNotExist,

    #[error("file does not exist")]
    FileNotExist,

    #[error("{kind} {id} does not exist")]
    EntityNotExist { kind: EntityKind, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// True for connection-class failures worth another attempt.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(err) => is_transient_sqlx(err),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
        ),
        sqlx::Error::PoolTimedOut => true,
        // SQLSTATE class 08: connection exception.
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("08")),
        _ => false,
    }
}

#[async_trait]
pub trait UserStorage: Send + Sync {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;
    async fn user_by_email(&self, email: &str) -> Result<User>;
}

#[async_trait]
pub trait PasswordStorage: Send + Sync {
    async fn add_password(&self, pwd: &Password) -> Result<i64>;
    async fn update_password(&self, pwd: &Password) -> Result<()>;
    async fn delete_password(&self, id: i64, owner_id: i64) -> Result<()>;
    async fn passwords(&self, owner_id: i64) -> Result<Vec<Password>>;
}

#[async_trait]
pub trait CardStorage: Send + Sync {
    async fn add_card(&self, card: &Card) -> Result<i64>;
    async fn update_card(&self, card: &Card) -> Result<()>;
    async fn delete_card(&self, id: i64, owner_id: i64) -> Result<()>;
    async fn cards(&self, owner_id: i64) -> Result<Vec<Card>>;
}

#[async_trait]
pub trait TextStorage: Send + Sync {
    async fn add_text(&self, text: &Text) -> Result<i64>;
    async fn update_text(&self, text: &Text) -> Result<()>;
    async fn delete_text(&self, id: i64, owner_id: i64) -> Result<()>;
    async fn texts(&self, owner_id: i64) -> Result<Vec<Text>>;
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Inserts a metadata row with `uploaded = false`.
    async fn add_file(&self, file: &FileMeta) -> Result<i64>;
    /// Looks a file up by id and owner, whatever its upload state.
    async fn file(&self, id: i64, owner_id: i64) -> Result<FileMeta>;
    async fn mark_file_uploaded(&self, id: i64, owner_id: i64) -> Result<()>;
    async fn delete_file(&self, id: i64, owner_id: i64) -> Result<()>;
    /// Completed uploads only.
    async fn files(&self, owner_id: i64) -> Result<Vec<FileMeta>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failures_are_transient() {
        for kind in [
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
        ] {
            let err = StorageError::from(sqlx::Error::Io(io::Error::from(kind)));
            assert!(err.is_transient(), "{kind:?} should be retried");
        }
        assert!(StorageError::from(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn test_domain_and_other_failures_are_not_transient() {
        assert!(!StorageError::UserAlreadyExists.is_transient());
        assert!(!StorageError::UserNotExist.is_transient());
        assert!(!StorageError::FileNotExist.is_transient());
        assert!(!StorageError::from(sqlx::Error::RowNotFound).is_transient());
        assert!(
            !StorageError::from(sqlx::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied)))
                .is_transient()
        );
    }
}
