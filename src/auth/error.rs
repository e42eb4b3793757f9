// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Token and key failures are distinct variants so they can be logged
//! precisely, but everything a client can trigger by presenting a bad token
//! collapses to one generic `401 unauthorized` response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::Algorithm;
use serde::Serialize;

use crate::error::IntegrityFault;

/// Fixed message for a missing or malformed `Authorization` header.
pub const BEARER_FORMAT_MESSAGE: &str = "expected authorization header format: bearer <token>";

/// Fixed message for every token validation failure.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized";

/// Fixed message for a failed role check.
pub const FORBIDDEN_MESSAGE: &str = "you are not authorized for that action";

/// Failure to resolve a verification key for a KID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyLookupError {
    /// No key registered under this KID
    #[error("no verification key found for kid {0}")]
    NotFound(String),
    /// The backing key store could not answer (e.g. remote set never fetched)
    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Token is not a well-formed JWT or its claims do not decode
    #[error("token is malformed: {0}")]
    Malformed(String),
    /// Token header names an algorithm other than the configured one
    #[error("token algorithm {found:?} does not match expected {expected:?}")]
    AlgorithmMismatch {
        expected: Algorithm,
        found: Algorithm,
    },
    /// Token header carries no `kid`
    #[error("token header has no kid")]
    MissingKid,
    /// `kid` is not known to the key store
    #[error("unknown kid {0}")]
    UnknownKid(String),
    /// Key store failed to answer
    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),
    /// Signature does not verify against the resolved key
    #[error("token signature mismatch")]
    SignatureMismatch,
    /// Token `exp` is not in the future
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },
}

impl From<KeyLookupError> for TokenError {
    fn from(err: KeyLookupError) -> Self {
        match err {
            KeyLookupError::NotFound(kid) => TokenError::UnknownKid(kid),
            KeyLookupError::Unavailable(reason) => TokenError::KeyUnavailable(reason),
        }
    }
}

/// Failure to sign a token.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// No signing key registered under this KID
    #[error("no signing key for kid {0}")]
    UnknownKid(String),
    /// Configured algorithm needs a different kind of key than the one stored
    #[error("algorithm {algorithm:?} cannot sign with the {key_type} key stored for kid {kid}")]
    KeyTypeMismatch {
        algorithm: Algorithm,
        kid: String,
        key_type: &'static str,
    },
    /// Encoding or cryptographic failure
    #[error("encoding token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// Failure to construct an authenticator or load key material.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// Algorithm is not one of the supported RS/HS variants
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    /// No signing keys were provided
    #[error("at least one signing key is required")]
    EmptyKeySet,
    /// Key material could not be parsed
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// Key file could not be read
    #[error("reading key file: {0}")]
    Io(#[from] std::io::Error),
    /// Remote key sets are only fetched over HTTPS
    #[error("JWKS URL must use https: {0}")]
    InsecureJwksUrl(String),
    /// HTTP client for the remote key set could not be built
    #[error("building JWKS client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Authentication error type.
///
/// Produced by the access-control middleware and extractors.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Authorization header is not `bearer <token>`
    InvalidAuthHeader,
    /// Token failed validation
    InvalidToken(TokenError),
    /// Authenticated, but none of the required roles are held
    InsufficientPermissions,
    /// Claims or request context missing where the pipeline guarantees them
    MissingClaims,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::MissingClaims => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client. Never reveals why a token was rejected.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader => BEARER_FORMAT_MESSAGE,
            AuthError::InvalidToken(_) => UNAUTHORIZED_MESSAGE,
            AuthError::InsufficientPermissions => FORBIDDEN_MESSAGE,
            AuthError::MissingClaims => "internal server error",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => write!(f, "{BEARER_FORMAT_MESSAGE}"),
            AuthError::InvalidToken(cause) => write!(f, "invalid token: {cause}"),
            AuthError::InsufficientPermissions => write!(f, "{FORBIDDEN_MESSAGE}"),
            AuthError::MissingClaims => write!(f, "claims missing from request context"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::InvalidToken(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message().to_string(),
        });
        let mut response = (status, body).into_response();
        if let AuthError::MissingClaims = self {
            response
                .extensions_mut()
                .insert(IntegrityFault::new(self.to_string()));
        }
        response
    }
}
