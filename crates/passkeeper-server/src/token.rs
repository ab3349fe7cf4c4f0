//! Identity tokens
//!
//! HMAC-signed JWTs binding a user id and email. Verification accepts only
//! the HMAC family, so a token minted with any other algorithm is rejected
//! before its signature is even looked at.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::models::User;

const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("failed to issue token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uid: i64,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub uid: i64,
    pub email: String,
}

/// Issues and verifies identity tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl: None,
        }
    }

    /// Adds an `exp` claim `ttl` after issuance to every token.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let claims = Claims {
            uid: user.id,
            email: user.email.clone(),
            exp: self
                .ttl
                .map(|ttl| Utc::now().timestamp().max(0) as u64 + ttl.as_secs()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(TokenError::Issue)
    }

    /// Verifies `token` against this service's secret.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        verify(token, &self.secret)
    }
}

/// Verifies `token` against `secret` and returns the bound identity.
///
/// Fails on a bad signature, a malformed token, a non-HMAC algorithm, an
/// expired `exp`, or `uid`/`email` claims that are missing or mistyped.
pub fn verify(token: &str, secret: &[u8]) -> Result<VerifiedClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = HMAC_FAMILY.to_vec();
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(TokenError::Invalid)?;

    Ok(VerifiedClaims {
        uid: data.claims.uid,
        email: data.claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    fn user() -> User {
        User {
            id: 7,
            email: "alice@example.com".into(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn sign_raw(claims: serde_json::Value, alg: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = TokenService::new("s3cret");
        let token = tokens.issue(&user()).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(
            claims,
            VerifiedClaims {
                uid: 7,
                email: "alice@example.com".into()
            }
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new("s3cret").issue(&user()).unwrap();
        assert!(matches!(
            verify(&token, b"other"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_ttl_adds_exp_and_expired_tokens_fail() {
        let tokens = TokenService::new("s3cret").with_ttl(Duration::from_secs(3600));
        assert!(tokens.verify(&tokens.issue(&user()).unwrap()).is_ok());

        let expired = sign_raw(
            json!({"uid": 7, "email": "alice@example.com", "exp": 1_000}),
            Algorithm::HS256,
            b"s3cret",
        );
        assert!(verify(&expired, b"s3cret").is_err());
    }

    #[test]
    fn test_other_hmac_strengths_accepted() {
        let token = sign_raw(
            json!({"uid": 7, "email": "alice@example.com"}),
            Algorithm::HS512,
            b"s3cret",
        );
        assert_eq!(verify(&token, b"s3cret").unwrap().uid, 7);
    }

    #[test]
    fn test_missing_or_mistyped_claims_rejected() {
        let no_email = sign_raw(json!({"uid": 7}), Algorithm::HS256, b"s3cret");
        assert!(verify(&no_email, b"s3cret").is_err());

        let no_uid = sign_raw(json!({"email": "a@b.c"}), Algorithm::HS256, b"s3cret");
        assert!(verify(&no_uid, b"s3cret").is_err());

        let uid_as_string = sign_raw(
            json!({"uid": "7", "email": "a@b.c"}),
            Algorithm::HS256,
            b"s3cret",
        );
        assert!(verify(&uid_as_string, b"s3cret").is_err());

        let email_as_number = sign_raw(json!({"uid": 7, "email": 5}), Algorithm::HS256, b"s3cret");
        assert!(verify(&email_as_number, b"s3cret").is_err());
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"uid":7,"email":"alice@example.com"}"#);
        let signature = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
        let forged = format!("{header}.{payload}.{signature}");
        assert!(verify(&forged, b"s3cret").is_err());

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let unsigned = format!("{none_header}.{payload}.");
        assert!(verify(&unsigned, b"s3cret").is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(verify("not.a.jwt", b"s3cret").is_err());
        assert!(verify("", b"s3cret").is_err());
    }
}
