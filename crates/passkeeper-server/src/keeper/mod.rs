//! Keeper
//!
//! Owner-scoped CRUD over every secret kind. Each call is dispatched on the
//! entity's kind to the matching storage port; files additionally have
//! their bytes in the blob store and are created only through
//! [`Keeper::upload`].

pub mod transfer;

use std::sync::Arc;

use passkeeper_blob::{BlobError, BlobStore};
use thiserror::Error;
use tracing::{debug, info, warn, Span};

use crate::models::{Entity, EntityKind, UnknownEntityKind};
use crate::storage::{CardStorage, FileStorage, PasswordStorage, StorageError, TextStorage};

pub use transfer::{DownloadChunk, DownloadStream, UploadChunk, DOWNLOAD_CHUNK_SIZE};

pub type Result<T> = std::result::Result<T, KeeperError>;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("files cannot be saved directly, upload them instead")]
    FileCannotBeSaved,

    #[error("files cannot be updated, delete and upload again")]
    FileCannotBeUpdated,

    #[error("unknown entity type: {0:?}")]
    UnknownEntity(String),

    #[error("file not found")]
    FileNotFound,

    #[error("{kind} {id} not found")]
    EntityNotFound { kind: EntityKind, id: i64 },

    #[error("invalid upload: {0}")]
    InvalidUpload(&'static str),

    #[error("upload stream failed: {0}")]
    Stream(String),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for KeeperError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotExist => KeeperError::FileNotFound,
            StorageError::EntityNotExist { kind, id } => KeeperError::EntityNotFound { kind, id },
            other => KeeperError::Storage(other),
        }
    }
}

impl From<UnknownEntityKind> for KeeperError {
    fn from(err: UnknownEntityKind) -> Self {
        KeeperError::UnknownEntity(err.0)
    }
}

/// The storage capabilities a [`Keeper`] needs.
#[derive(Clone)]
pub struct StoragePorts {
    pub passwords: Arc<dyn PasswordStorage>,
    pub cards: Arc<dyn CardStorage>,
    pub texts: Arc<dyn TextStorage>,
    pub files: Arc<dyn FileStorage>,
}

impl StoragePorts {
    /// All four ports backed by one storage value.
    pub fn shared<S>(storage: Arc<S>) -> Self
    where
        S: PasswordStorage + CardStorage + TextStorage + FileStorage + 'static,
    {
        Self {
            passwords: storage.clone(),
            cards: storage.clone(),
            texts: storage.clone(),
            files: storage,
        }
    }
}

#[derive(Clone)]
pub struct Keeper {
    ports: StoragePorts,
    blobs: BlobStore,
    span: Span,
}

impl Keeper {
    pub fn new(ports: StoragePorts, blobs: BlobStore, span: Span) -> Self {
        Self { ports, blobs, span }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Stores a new secret for `entity`'s owner and returns its id.
    pub async fn save(&self, entity: &Entity) -> Result<i64> {
        let id = match entity {
            Entity::Password(pwd) => self.ports.passwords.add_password(pwd).await?,
            Entity::Card(card) => self.ports.cards.add_card(card).await?,
            Entity::Text(text) => self.ports.texts.add_text(text).await?,
            Entity::File(_) => return Err(KeeperError::FileCannotBeSaved),
        };
        debug!(parent: &self.span, kind = %entity.kind(), id, owner = entity.owner_id(), "saved");
        Ok(id)
    }

    /// Replaces the stored fields of the secret identified by `entity`'s id
    /// and owner.
    pub async fn update(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Password(pwd) => self.ports.passwords.update_password(pwd).await?,
            Entity::Card(card) => self.ports.cards.update_card(card).await?,
            Entity::Text(text) => self.ports.texts.update_text(text).await?,
            Entity::File(_) => return Err(KeeperError::FileCannotBeUpdated),
        }
        debug!(parent: &self.span, kind = %entity.kind(), id = entity.id(), "updated");
        Ok(())
    }

    /// Deletes one secret. For files the blob goes first; if that fails the
    /// row is kept.
    pub async fn delete(&self, id: i64, owner_id: i64, kind: EntityKind) -> Result<()> {
        match kind {
            EntityKind::Password => self.ports.passwords.delete_password(id, owner_id).await?,
            EntityKind::Card => self.ports.cards.delete_card(id, owner_id).await?,
            EntityKind::Text => self.ports.texts.delete_text(id, owner_id).await?,
            EntityKind::File => self.delete_file(id, owner_id).await?,
        }
        debug!(parent: &self.span, %kind, id, owner = owner_id, "deleted");
        Ok(())
    }

    async fn delete_file(&self, id: i64, owner_id: i64) -> Result<()> {
        let file = self.ports.files.file(id, owner_id).await?;
        let name = BlobStore::blob_name(file.id, &file.filename);

        match self.blobs.remove(&name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(parent: &self.span, blob = %name, "blob already gone, removing row");
            }
            Err(e) => return Err(e.into()),
        }

        self.ports.files.delete_file(id, owner_id).await?;
        info!(parent: &self.span, id, owner = owner_id, "file deleted");
        Ok(())
    }

    /// Every secret `owner_id` keeps: passwords, cards, texts, then
    /// completed files. Any failing port fails the whole listing.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<Entity>> {
        let passwords = self.ports.passwords.passwords(owner_id).await?;
        let cards = self.ports.cards.cards(owner_id).await?;
        let texts = self.ports.texts.texts(owner_id).await?;
        let files = self.ports.files.files(owner_id).await?;

        let mut entities =
            Vec::with_capacity(passwords.len() + cards.len() + texts.len() + files.len());
        entities.extend(passwords.into_iter().map(Entity::Password));
        entities.extend(cards.into_iter().map(Entity::Card));
        entities.extend(texts.into_iter().map(Entity::Text));
        entities.extend(files.into_iter().map(Entity::File));

        debug!(parent: &self.span, owner = owner_id, count = entities.len(), "listed");
        Ok(entities)
    }
}
