// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-control middleware for Axum.
//!
//! Two stages, composed per route group:
//!
//! - [`authenticate`] verifies the bearer token and stores the claims on the
//!   request's [`RequestContext`]
//! - [`authorize`] checks the stored claims against a [`RequiredRoles`] set
//!
//! Authenticate must run before Authorize. With `Router::route_layer` the
//! layer added last runs first:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/v1/users/{page}/{rows}", get(list_users))
//!     .route_layer(from_fn_with_state(RequiredRoles::new([Role::Admin]), authorize))
//!     .route_layer(from_fn_with_state(auth.clone(), authenticate));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::{Auth, AuthError, Claims, Role};
use crate::context::RequestContext;

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly two parts separated by a single space, the
/// first equal to `bearer` in any letter case and the second non-empty.
pub fn parse_bearer(value: &str) -> Result<&str, AuthError> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Read and parse the bearer token, if an `Authorization` header is present.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    parse_bearer(value).map(Some)
}

/// Verify `token` and log why it was rejected.
pub fn verify_bearer(auth: &Auth, token: &str, trace_id: &str) -> Result<Claims, AuthError> {
    auth.validate_token(token).map_err(|cause| {
        tracing::warn!(trace_id, error = %cause, "Rejected bearer token");
        AuthError::InvalidToken(cause)
    })
}

/// Authenticate stage.
pub async fn authenticate(
    State(auth): State<Arc<Auth>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = match bearer_token(request.headers()) {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => return Err(AuthError::MissingAuthHeader),
        Err(e) => return Err(e),
    };

    let ctx = request
        .extensions_mut()
        .get_mut::<RequestContext>()
        .ok_or(AuthError::MissingClaims)?;

    let claims = verify_bearer(&auth, &token, &ctx.trace_id)?;
    tracing::debug!(trace_id = %ctx.trace_id, sub = %claims.sub, "Authenticated");
    ctx.claims = Some(claims);

    Ok(next.run(request).await)
}

/// Roles an Authorize stage accepts. Holding any one of them is enough.
#[derive(Debug, Clone)]
pub struct RequiredRoles(Arc<[Role]>);

impl RequiredRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

/// Authorize stage.
pub async fn authorize(
    State(required): State<RequiredRoles>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .ok_or(AuthError::MissingClaims)?;
    let claims = ctx.claims.as_ref().ok_or(AuthError::MissingClaims)?;

    if !claims.authorized(required.roles()) {
        tracing::warn!(
            trace_id = %ctx.trace_id,
            sub = %claims.sub,
            required = ?required.roles(),
            "Insufficient roles"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}
