// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated claims.
//!
//! Use `AuthClaims` in handlers mounted behind the authenticate stage:
//!
//! ```rust,ignore
//! async fn me(AuthClaims(claims): AuthClaims) -> Json<Claims> {
//!     Json(claims)
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::middleware::{bearer_token, verify_bearer};
use super::{Auth, AuthError, Claims};
use crate::context::RequestContext;

/// Claims stored by the authenticate stage.
///
/// Rejects with an integrity fault when no claims are present: a handler using
/// this extractor is only reachable through the authenticate stage.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub Claims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.claims.clone())
            .map(AuthClaims)
            .ok_or(AuthError::MissingClaims)
    }
}

/// Optional authentication extractor for public routes.
///
/// Returns `None` when no `Authorization` header is sent. A header that is
/// present must still be a valid bearer token, otherwise the request is
/// rejected exactly as the authenticate stage would reject it.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    Arc<Auth>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.claims.clone())
        {
            return Ok(OptionalAuth(Some(claims)));
        }

        let Some(token) = bearer_token(&parts.headers)? else {
            return Ok(OptionalAuth(None));
        };

        let trace_id = parts
            .extensions
            .get::<RequestContext>()
            .map(|ctx| ctx.trace_id.clone())
            .unwrap_or_default();
        let auth = Arc::<Auth>::from_ref(state);
        let claims = verify_bearer(&auth, token, &trace_id)?;

        if let Some(ctx) = parts.extensions.get_mut::<RequestContext>() {
            ctx.claims = Some(claims.clone());
        }
        Ok(OptionalAuth(Some(claims)))
    }
}
