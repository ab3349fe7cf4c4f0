//! Authentication Module
//!
//! Handles registration and login. Passwords are stored as bcrypt hashes;
//! a successful login yields a signed identity token.

pub mod gate;
pub mod identity;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn, Span};
use validator::ValidateEmail;

use crate::models::User;
use crate::storage::{StorageError, UserStorage};
use crate::token::{TokenError, TokenService};

pub use gate::{mw_require_identity, AuthGate, GateError};
pub use identity::Identity;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user with this email already exists")]
    UserAlreadyExists,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(StorageError),

    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserAlreadyExists => AuthError::UserAlreadyExists,
            StorageError::UserNotExist => AuthError::InvalidCredentials,
            other => AuthError::Storage(other),
        }
    }
}

/// Checks credentials before any storage round trip.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::Validation("email is required"));
    }
    if !email.validate_email() {
        return Err(AuthError::Validation("email is invalid"));
    }
    if password.is_empty() {
        return Err(AuthError::Validation("password is required"));
    }
    Ok(())
}

pub struct AuthService {
    users: Arc<dyn UserStorage>,
    tokens: TokenService,
    hash_cost: u32,
    span: Span,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStorage>, tokens: TokenService, span: Span) -> Self {
        Self {
            users,
            tokens,
            hash_cost: bcrypt::DEFAULT_COST,
            span,
        }
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Creates a user and returns it with a freshly issued token.
    #[instrument(parent = &self.span, skip_all, fields(email = %email))]
    pub async fn register(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        validate_credentials(email, password)?;

        let password = password.to_owned();
        let cost = self.hash_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let user = self.users.create_user(email, &password_hash).await?;
        let token = self.tokens.issue(&user)?;

        info!(uid = user.id, "user registered");
        Ok((user, token))
    }

    /// Exchanges credentials for a token.
    #[instrument(parent = &self.span, skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        validate_credentials(email, password)?;

        let user = self.users.user_by_email(email).await?;

        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
        match matches {
            Ok(true) => {}
            Ok(false) => {
                warn!("failed login attempt");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                warn!("stored hash could not be checked: {}", e);
                return Err(AuthError::InvalidCredentials);
            }
        }

        let token = self.tokens.issue(&user)?;
        info!(uid = user.id, "user logged in");
        Ok(token)
    }
}
