//! Secret CRUD endpoints. The owner always comes from the caller's
//! identity; any `owner_id` in a request body is ignored.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::IdResponse;
use crate::auth::Identity;
use crate::config::AppState;
use crate::error::Result;
use crate::models::{Entity, EntityKind};

/// POST /entities
pub async fn add_entity(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<IdResponse>> {
    let Json(body) = body?;
    let entity = Entity::from_json(body)?.owned_by(identity.uid());
    let id = state.keeper.save(&entity).await?;
    Ok(Json(IdResponse { id }))
}

/// PUT /entities/{id}
pub async fn update_entity(
    State(state): State<AppState>,
    identity: Identity,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode> {
    let (Path(id), Json(body)) = (id?, body?);
    let mut entity = Entity::from_json(body)?.owned_by(identity.uid());
    entity.set_id(id);
    state.keeper.update(&entity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /entities/{type}/{id}
pub async fn delete_entity(
    State(state): State<AppState>,
    identity: Identity,
    path: std::result::Result<Path<(String, i64)>, PathRejection>,
) -> Result<StatusCode> {
    let Path((kind, id)) = path?;
    let kind: EntityKind = kind.parse()?;
    state.keeper.delete(id, identity.uid(), kind).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /entities
pub async fn list_entities(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Entity>>> {
    let entities = state.keeper.list(identity.uid()).await?;
    Ok(Json(entities))
}
