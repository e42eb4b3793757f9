// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{Auth, JwksKeyStore};
use crate::storage::UserDatabase;
use crate::users::{RequestValidator, UserService};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub users: Arc<dyn UserService>,
    /// Used by the readiness check
    pub db: Arc<UserDatabase>,
    pub validator: RequestValidator,
    /// Remote verification keys, when `AUTH_JWKS_URL` is configured
    pub jwks: Option<JwksKeyStore>,
    /// Rendered by `GET /metrics`
    pub metrics: Option<PrometheusHandle>,
    /// Cancelled on integrity faults and termination signals
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        auth: Arc<Auth>,
        users: Arc<dyn UserService>,
        db: Arc<UserDatabase>,
        validator: RequestValidator,
    ) -> Self {
        Self {
            auth,
            users,
            db,
            validator,
            jwks: None,
            metrics: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_jwks(mut self, jwks: JwksKeyStore) -> Self {
        self.jwks = Some(jwks);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl FromRef<AppState> for Arc<Auth> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for CancellationToken {
    fn from_ref(state: &AppState) -> Self {
        state.shutdown.clone()
    }
}

impl FromRef<AppState> for RequestValidator {
    fn from_ref(state: &AppState) -> Self {
        state.validator.clone()
    }
}
