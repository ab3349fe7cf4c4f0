use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Authenticated caller, inserted into request extensions by the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    uid: i64,
    email: String,
}

impl Identity {
    pub fn new(uid: i64, email: String) -> Self {
        Self { uid, email }
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::IdentityMissing)
    }
}
