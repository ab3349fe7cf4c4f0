//! Authentication gate
//!
//! The only place a raw token is read. Every request outside the
//! allow-list must carry exactly one `token` header; on success the header
//! is dropped and an [`Identity`] takes its place in the request
//! extensions. Streaming routes pass through the same layer with their
//! body untouched.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::{debug, info, Span};

use super::identity::Identity;
use crate::config::AppState;
use crate::error::ApiError;
use crate::token::TokenService;

/// Request metadata field carrying the token.
pub const TOKEN_HEADER: &str = "token";

/// Routes reachable without a token.
pub const OPEN_PATHS: &[&str] = &["/auth/login", "/auth/register", "/health"];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("missing token")]
    MissingToken,

    #[error("wrong token format")]
    WrongTokenFormat,

    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    tokens: TokenService,
    open_paths: Vec<String>,
    span: Span,
}

impl AuthGate {
    pub fn new(tokens: TokenService, span: Span) -> Self {
        Self {
            tokens,
            open_paths: OPEN_PATHS.iter().map(|p| p.to_string()).collect(),
            span,
        }
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.open_paths.iter().any(|p| p == path)
    }

    /// Resolves the caller from request headers.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Identity, GateError> {
        let mut values = headers.get_all(TOKEN_HEADER).iter();
        let token = match (values.next(), values.next()) {
            (None, _) => return Err(GateError::MissingToken),
            (Some(_), Some(_)) => return Err(GateError::WrongTokenFormat),
            (Some(value), None) => value.to_str().map_err(|_| GateError::WrongTokenFormat)?,
        };

        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(parent: &self.span, "token rejected: {}", e);
            GateError::InvalidToken
        })?;

        Ok(Identity::new(claims.uid, claims.email))
    }
}

pub async fn mw_require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let gate = &state.gate;
    if gate.is_open(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let identity = gate.resolve(req.headers()).map_err(|e| {
        info!(parent: &gate.span, path = %req.uri().path(), "{}", e);
        e
    })?;
    debug!(parent: &gate.span, uid = identity.uid(), "request authenticated");

    req.headers_mut().remove(TOKEN_HEADER);
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
