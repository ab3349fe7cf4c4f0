use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::mw_require_identity;
use crate::config::AppState;
use crate::handlers::{
    add_entity, delete_entity, download_file, health_check, list_entities, login, register,
    update_entity, upload_file,
};

pub fn app_router(state: AppState) -> Router {
    Router::new()
        // Auth endpoints
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // Secrets
        .route("/entities", get(list_entities).post(add_entity))
        .route("/entities/{id}", put(update_entity))
        .route("/entities/{kind}/{id}", delete(delete_entity))
        // Files
        .route("/files", post(upload_file))
        .route("/files/{id}", get(download_file))
        // Health check
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            mw_require_identity,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
