// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT signing and verification.
//!
//! ## Verification order
//!
//! 1. Parse the header (`Malformed` on failure)
//! 2. Pin the algorithm: the header `alg` must equal the configured one,
//!    checked before any key is looked up
//! 3. Resolve the header `kid` through the [`KeyLookup`]
//! 4. Verify the signature and decode the claims
//! 5. Check expiry with an exclusive boundary (`exp <= now` is expired)
//!
//! No clock skew leeway is applied.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};

use super::claims::Claims;
use super::error::{SigningError, TokenError};
use super::keystore::{KeyKind, KeyLookup, SigningKeys};

/// Signs claims into tokens and verifies tokens back into claims.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    lookup: Arc<dyn KeyLookup>,
    keys: Arc<SigningKeys>,
}

impl TokenCodec {
    pub fn new(algorithm: Algorithm, lookup: Arc<dyn KeyLookup>, keys: SigningKeys) -> Self {
        Self {
            algorithm,
            lookup,
            keys: Arc::new(keys),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` with the key registered under `kid`.
    ///
    /// The KID is written to the token header so verifiers can find the
    /// matching key.
    pub fn sign(&self, kid: &str, claims: &Claims) -> Result<String, SigningError> {
        let key = self
            .keys
            .get(kid)
            .ok_or_else(|| SigningError::UnknownKid(kid.to_string()))?;

        if KeyKind::for_algorithm(self.algorithm) != Some(key.kind()) {
            return Err(SigningError::KeyTypeMismatch {
                algorithm: self.algorithm,
                kid: kid.to_string(),
                key_type: key.kind().as_str(),
            });
        }

        let mut header = Header::new(self.algorithm);
        header.kid = Some(kid.to_string());

        Ok(encode(&header, claims, key.encoding_key())?)
    }

    /// Verify `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify `token` as if the current time were `now` (Unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if header.alg != self.algorithm {
            return Err(TokenError::AlgorithmMismatch {
                expected: self.algorithm,
                found: header.alg,
            });
        }

        let kid = header.kid.ok_or(TokenError::MissingKid)?;
        let key = self.lookup.lookup(&kid)?;

        // Expiry is checked below with an exclusive boundary and no leeway;
        // audience is informational.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
                ErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch {
                    expected: self.algorithm,
                    found: header.alg,
                },
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired {
                exp: claims.exp,
                now,
            });
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
