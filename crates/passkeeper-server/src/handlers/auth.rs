use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::AppState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    req: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>> {
    let Json(req) = req?;
    let (user, token) = state.auth.register(&req.email, &req.password).await?;
    Ok(Json(RegisterResponse {
        user_id: user.id,
        token,
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    req: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(req) = req?;
    let token = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}
