//! SQLite storage adapter
//!
//! Every operation runs through [`retry`] with the adapter's policy, so a
//! database that is briefly unreachable costs latency instead of errors.
//! Domain conditions (duplicate email, missing user, missing file) are
//! translated inside the retried closure and are never retried.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use tracing::{info, Instrument, Span};

use super::{
    retry, CardStorage, FileStorage, PasswordStorage, Result, RetryPolicy, StorageError,
    TextStorage, UserStorage,
};
use crate::models::{Card, EntityKind, FileMeta, Password, Text, User};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS passwords (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        login TEXT NOT NULL,
        password TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        number TEXT NOT NULL,
        cvc TEXT NOT NULL,
        holder TEXT NOT NULL,
        expiry TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS texts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        filename TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '',
        uploaded INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_passwords_owner ON passwords(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_cards_owner ON cards(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_texts_owner ON texts(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id)",
];

/// Relational storage for users and all four secret kinds.
#[derive(Clone, Debug)]
pub struct SqlStorage {
    pool: SqlitePool,
    retry: RetryPolicy,
    span: Span,
}

impl SqlStorage {
    /// Connects to `url`, creating the database file if needed, and applies
    /// the schema. Connecting is retried like any other operation.
    pub async fn connect(url: &str, max_connections: u32, span: Span) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let policy = RetryPolicy::default();
        let pool = retry(&policy, StorageError::is_transient, || {
            let options = options.clone();
            async move {
                SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_with(options)
                    .await
                    .map_err(StorageError::from)
            }
        })
        .instrument(span.clone())
        .await?;

        let storage = Self::from_pool(pool, span);
        storage.migrate().await?;
        Ok(storage)
    }

    /// Wraps an existing pool. The schema is not touched.
    pub fn from_pool(pool: SqlitePool, span: Span) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
            span,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            self.run("migrate", || async move {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .map_err(StorageError::from)
            })
            .await?;
        }
        info!(parent: &self.span, "[Storage] schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry(&self.retry, StorageError::is_transient, f)
            .instrument(tracing::debug_span!(parent: &self.span, "storage", op))
            .await
    }
}

fn affected(rows: u64, missing: StorageError) -> Result<()> {
    if rows == 0 {
        return Err(missing);
    }
    Ok(())
}

#[async_trait]
impl UserStorage for SqlStorage {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        self.run("create_user", || async move {
            sqlx::query_as::<_, User>(
                "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?) \
                 RETURNING id, email, password_hash, created_at",
            )
            .bind(email)
            .bind(password_hash)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StorageError::UserAlreadyExists
                }
                other => other.into(),
            })
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        self.run("user_by_email", || async move {
            sqlx::query_as::<_, User>(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UserNotExist)
        })
        .await
    }
}

#[async_trait]
impl PasswordStorage for SqlStorage {
    async fn add_password(&self, pwd: &Password) -> Result<i64> {
        self.run("add_password", || async move {
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO passwords (owner_id, login, password, metadata, created_at) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(pwd.owner_id)
            .bind(&pwd.login)
            .bind(&pwd.password)
            .bind(&pwd.metadata)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }

    async fn update_password(&self, pwd: &Password) -> Result<()> {
        self.run("update_password", || async move {
            let done = sqlx::query(
                "UPDATE passwords SET login = ?, password = ?, metadata = ? \
                 WHERE id = ? AND owner_id = ?",
            )
            .bind(&pwd.login)
            .bind(&pwd.password)
            .bind(&pwd.metadata)
            .bind(pwd.id)
            .bind(pwd.owner_id)
            .execute(&self.pool)
            .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Password,
                    id: pwd.id,
                },
            )
        })
        .await
    }

    async fn delete_password(&self, id: i64, owner_id: i64) -> Result<()> {
        self.run("delete_password", || async move {
            let done = sqlx::query("DELETE FROM passwords WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Password,
                    id,
                },
            )
        })
        .await
    }

    async fn passwords(&self, owner_id: i64) -> Result<Vec<Password>> {
        self.run("passwords", || async move {
            sqlx::query_as::<_, Password>(
                "SELECT id, owner_id, login, password, metadata, created_at \
                 FROM passwords WHERE owner_id = ? ORDER BY id",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }
}

#[async_trait]
impl CardStorage for SqlStorage {
    async fn add_card(&self, card: &Card) -> Result<i64> {
        self.run("add_card", || async move {
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO cards (owner_id, number, cvc, holder, expiry, metadata, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(card.owner_id)
            .bind(&card.number)
            .bind(&card.cvc)
            .bind(&card.holder)
            .bind(&card.expiry)
            .bind(&card.metadata)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }

    async fn update_card(&self, card: &Card) -> Result<()> {
        self.run("update_card", || async move {
            let done = sqlx::query(
                "UPDATE cards SET number = ?, cvc = ?, holder = ?, expiry = ?, metadata = ? \
                 WHERE id = ? AND owner_id = ?",
            )
            .bind(&card.number)
            .bind(&card.cvc)
            .bind(&card.holder)
            .bind(&card.expiry)
            .bind(&card.metadata)
            .bind(card.id)
            .bind(card.owner_id)
            .execute(&self.pool)
            .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Card,
                    id: card.id,
                },
            )
        })
        .await
    }

    async fn delete_card(&self, id: i64, owner_id: i64) -> Result<()> {
        self.run("delete_card", || async move {
            let done = sqlx::query("DELETE FROM cards WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Card,
                    id,
                },
            )
        })
        .await
    }

    async fn cards(&self, owner_id: i64) -> Result<Vec<Card>> {
        self.run("cards", || async move {
            sqlx::query_as::<_, Card>(
                "SELECT id, owner_id, number, cvc, holder, expiry, metadata, created_at \
                 FROM cards WHERE owner_id = ? ORDER BY id",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }
}

#[async_trait]
impl TextStorage for SqlStorage {
    async fn add_text(&self, text: &Text) -> Result<i64> {
        self.run("add_text", || async move {
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO texts (owner_id, body, metadata, created_at) \
                 VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(text.owner_id)
            .bind(&text.body)
            .bind(&text.metadata)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }

    async fn update_text(&self, text: &Text) -> Result<()> {
        self.run("update_text", || async move {
            let done = sqlx::query(
                "UPDATE texts SET body = ?, metadata = ? WHERE id = ? AND owner_id = ?",
            )
            .bind(&text.body)
            .bind(&text.metadata)
            .bind(text.id)
            .bind(text.owner_id)
            .execute(&self.pool)
            .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Text,
                    id: text.id,
                },
            )
        })
        .await
    }

    async fn delete_text(&self, id: i64, owner_id: i64) -> Result<()> {
        self.run("delete_text", || async move {
            let done = sqlx::query("DELETE FROM texts WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?;
            affected(
                done.rows_affected(),
                StorageError::EntityNotExist {
                    kind: EntityKind::Text,
                    id,
                },
            )
        })
        .await
    }

    async fn texts(&self, owner_id: i64) -> Result<Vec<Text>> {
        self.run("texts", || async move {
            sqlx::query_as::<_, Text>(
                "SELECT id, owner_id, body, metadata, created_at \
                 FROM texts WHERE owner_id = ? ORDER BY id",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }
}

#[async_trait]
impl FileStorage for SqlStorage {
    async fn add_file(&self, file: &FileMeta) -> Result<i64> {
        self.run("add_file", || async move {
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO files (owner_id, filename, metadata, uploaded, created_at) \
                 VALUES (?, ?, ?, 0, ?) RETURNING id",
            )
            .bind(file.owner_id)
            .bind(&file.filename)
            .bind(&file.metadata)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }

    async fn file(&self, id: i64, owner_id: i64) -> Result<FileMeta> {
        self.run("file", || async move {
            sqlx::query_as::<_, FileMeta>(
                "SELECT id, owner_id, filename, metadata, uploaded, created_at \
                 FROM files WHERE id = ? AND owner_id = ?",
            )
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::FileNotExist)
        })
        .await
    }

    async fn mark_file_uploaded(&self, id: i64, owner_id: i64) -> Result<()> {
        self.run("mark_file_uploaded", || async move {
            let done = sqlx::query("UPDATE files SET uploaded = 1 WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?;
            affected(done.rows_affected(), StorageError::FileNotExist)
        })
        .await
    }

    async fn delete_file(&self, id: i64, owner_id: i64) -> Result<()> {
        self.run("delete_file", || async move {
            let done = sqlx::query("DELETE FROM files WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?;
            affected(done.rows_affected(), StorageError::FileNotExist)
        })
        .await
    }

    async fn files(&self, owner_id: i64) -> Result<Vec<FileMeta>> {
        self.run("files", || async move {
            sqlx::query_as::<_, FileMeta>(
                "SELECT id, owner_id, filename, metadata, uploaded, created_at \
                 FROM files WHERE owner_id = ? AND uploaded = 1 ORDER BY id",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)
        })
        .await
    }
}
