//! HTTP handlers

pub mod auth;
pub mod entities;
pub mod files;

use serde::Serialize;

pub use auth::{login, register};
pub use entities::{add_entity, delete_entity, list_entities, update_entity};
pub use files::{download_file, upload_file};

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: i64,
}

pub async fn health_check() -> &'static str {
    "OK - Passkeeper Server"
}
