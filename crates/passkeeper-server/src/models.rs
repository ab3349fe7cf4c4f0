//! Data models
//!
//! Users plus the four secret kinds a user can keep. Every secret row is
//! owned by exactly one user; ids are unique per kind only, so
//! `(kind, id)` is the real key of a secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// User record stored in database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Password,
    Card,
    Text,
    File,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Password => "password",
            EntityKind::Card => "card",
            EntityKind::Text => "text",
            EntityKind::File => "file",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entity type: {0:?}")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(EntityKind::Password),
            "card" => Ok(EntityKind::Card),
            "text" => Ok(EntityKind::Text),
            "file" => Ok(EntityKind::File),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// Login/password pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Password {
    #[serde(default)]
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default, skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Bank card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Card {
    #[serde(default)]
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub number: String,
    pub cvc: String,
    /// Cardholder name as printed on the card.
    pub holder: String,
    pub expiry: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default, skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Text {
    #[serde(default)]
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub body: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default, skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Metadata row of an uploaded file. The bytes live in the blob store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileMeta {
    #[serde(default)]
    pub id: i64,
    #[serde(skip)]
    pub owner_id: i64,
    pub filename: String,
    #[serde(default)]
    pub metadata: String,
    /// False until every byte is persisted and the upload is marked complete.
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default, skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Any secret a user keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Password(Password),
    Card(Card),
    Text(Text),
    File(FileMeta),
}

#[derive(Error, Debug)]
pub enum EntityDecodeError {
    #[error(transparent)]
    UnknownKind(#[from] UnknownEntityKind),

    #[error("malformed entity: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Entity {
    /// Decodes an entity from its JSON form.
    ///
    /// The `type` tag is checked before the body so an unrecognised kind is
    /// reported as such rather than as a parse failure.
    pub fn from_json(value: serde_json::Value) -> Result<Self, EntityDecodeError> {
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if tag.parse::<EntityKind>()? == EntityKind::File {
            // File bodies are never stored from here; keep whatever parses.
            let file = serde_json::from_value::<FileMeta>(value).unwrap_or_default();
            return Ok(Entity::File(file));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Password(_) => EntityKind::Password,
            Entity::Card(_) => EntityKind::Card,
            Entity::Text(_) => EntityKind::Text,
            Entity::File(_) => EntityKind::File,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Entity::Password(p) => p.id,
            Entity::Card(c) => c.id,
            Entity::Text(t) => t.id,
            Entity::File(f) => f.id,
        }
    }

    pub fn owner_id(&self) -> i64 {
        match self {
            Entity::Password(p) => p.owner_id,
            Entity::Card(c) => c.owner_id,
            Entity::Text(t) => t.owner_id,
            Entity::File(f) => f.owner_id,
        }
    }

    pub fn set_id(&mut self, id: i64) {
        match self {
            Entity::Password(p) => p.id = id,
            Entity::Card(c) => c.id = id,
            Entity::Text(t) => t.id = id,
            Entity::File(f) => f.id = id,
        }
    }

    pub fn set_owner(&mut self, owner_id: i64) {
        match self {
            Entity::Password(p) => p.owner_id = owner_id,
            Entity::Card(c) => c.owner_id = owner_id,
            Entity::Text(t) => t.owner_id = owner_id,
            Entity::File(f) => f.owner_id = owner_id,
        }
    }

    #[must_use]
    pub fn owned_by(mut self, owner_id: i64) -> Self {
        self.set_owner(owner_id);
        self
    }
}
