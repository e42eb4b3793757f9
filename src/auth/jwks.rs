// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote JWKS (JSON Web Key Set) backed key store.
//!
//! Lets verification keys rotate without redeploying: another service
//! publishes its public keys as a JWK Set and this store mirrors them.
//!
//! ## Behaviour
//!
//! - JWKS is fetched via HTTPS only
//! - `lookup` is synchronous and reads the last fetched snapshot
//! - `refresh` is explicit (startup and readiness check); nothing runs in the
//!   background
//! - A failed refresh keeps serving the previous snapshot

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;

use super::error::{KeyLookupError, SetupError};
use super::keystore::{KeyLookup, RotatingKeyStore};

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Key store mirroring a remote JWK Set.
#[derive(Clone)]
pub struct JwksKeyStore {
    /// JWKS URL
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Keys from the last successful fetch
    keys: RotatingKeyStore,
    /// When the last successful fetch happened
    fetched_at: Arc<RwLock<Option<Instant>>>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksKeyStore {
    /// Create a new JWKS key store. No request is made until [`refresh`].
    ///
    /// [`refresh`]: JwksKeyStore::refresh
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, SetupError> {
        let jwks_url = jwks_url.into();
        if !jwks_url.starts_with("https://") {
            return Err(SetupError::InsecureJwksUrl(jwks_url));
        }

        Ok(Self {
            jwks_url,
            cache_ttl: DEFAULT_CACHE_TTL,
            keys: RotatingKeyStore::default(),
            fetched_at: Arc::new(RwLock::new(None)),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
        })
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Whether a snapshot exists and is younger than the TTL.
    pub fn is_fresh(&self) -> bool {
        self.fetched_at
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|at| at.elapsed() < self.cache_ttl)
    }

    /// Fetch the key set and swap it in.
    pub async fn refresh(&self) -> Result<usize, KeyLookupError> {
        let jwks = self.fetch_jwks().await?;
        let count = self.install(&jwks);
        tracing::info!(url = %self.jwks_url, keys = count, "JWKS refreshed");
        Ok(count)
    }

    /// Replace the snapshot with the usable keys of `jwks`.
    ///
    /// Keys without a `kid` or with unsupported parameters are skipped.
    pub fn install(&self, jwks: &JwkSet) -> usize {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::debug!("Skipping JWK without kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid.to_string(), key);
                }
                Err(e) => tracing::warn!(kid, error = %e, "Skipping unusable JWK"),
            }
        }

        let count = keys.len();
        self.keys.rotate(keys);
        *self.fetched_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        count
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, KeyLookupError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeyLookupError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyLookupError::Unavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KeyLookupError::Unavailable(e.to_string()))
    }
}

impl KeyLookup for JwksKeyStore {
    fn lookup(&self, kid: &str) -> Result<DecodingKey, KeyLookupError> {
        if self
            .fetched_at
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return Err(KeyLookupError::Unavailable(
                "JWKS has not been fetched yet".to_string(),
            ));
        }
        self.keys.lookup(kid)
    }
}
