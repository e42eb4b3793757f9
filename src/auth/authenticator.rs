// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticator: the single entry point for issuing and validating tokens.

use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::Algorithm;

use super::claims::Claims;
use super::codec::TokenCodec;
use super::error::{SetupError, SigningError, TokenError};
use super::keystore::{KeyKind, KeyLookup, SigningKeys};

/// Issues and validates tokens with one configured algorithm.
///
/// Immutable after construction; share it as `Arc<Auth>`.
#[derive(Clone, Debug)]
pub struct Auth {
    codec: TokenCodec,
}

impl Auth {
    /// Build an authenticator.
    ///
    /// `algorithm` must be one of RS256, RS384, RS512, HS256, HS384 or HS512.
    /// `lookup` resolves KIDs of incoming tokens; `keys` are the keys this
    /// process signs with and must not be empty.
    pub fn new(
        algorithm: &str,
        lookup: impl KeyLookup + 'static,
        keys: SigningKeys,
    ) -> Result<Self, SetupError> {
        let algorithm = parse_algorithm(algorithm)?;
        if keys.is_empty() {
            return Err(SetupError::EmptyKeySet);
        }

        Ok(Self {
            codec: TokenCodec::new(algorithm, Arc::new(lookup), keys),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.codec.algorithm()
    }

    /// Sign `claims` into a token under `kid`.
    pub fn generate_token(&self, kid: &str, claims: &Claims) -> Result<String, SigningError> {
        self.codec.sign(kid, claims)
    }

    /// Verify `token` and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.verify(token)
    }

    /// Verify `token` as of `now` (Unix seconds).
    pub fn validate_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        self.codec.verify_at(token, now)
    }
}

/// Parse a configured algorithm name, accepting only the RS and HS families.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, SetupError> {
    Algorithm::from_str(name)
        .ok()
        .filter(|alg| KeyKind::for_algorithm(*alg).is_some())
        .ok_or_else(|| SetupError::UnsupportedAlgorithm(name.to_string()))
}
